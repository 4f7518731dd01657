//! ChemLens - chemical compound image analyzer
//!
//! A CLI tool that sends an image of a compound to a local Ollama
//! vision model, refines the description with a text model, and
//! prints the result. Without a local runtime it prints a demo analysis.
//!
//! Exit codes:
//!   0 - Success, or demo analysis served
//!   1 - Runtime error (bad arguments, unreadable image or config)
//!   3 - Inference failed; the error analysis was still rendered

mod cli;
mod config;
mod inference;
mod models;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use inference::{AnalysisOrchestrator, InferenceTransport, OllamaTransport, UnavailableTransport};
use models::{AnalysisOutcome, AnalysisReport, ReportMetadata};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("ChemLens v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_analysis(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .chemlens.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE_NAME);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize endpoint, models, prompts, and demo text.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run one analysis end to end. Returns exit code (0 or 3).
async fn run_analysis(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let image_path = args.image_path().to_path_buf();
    let image = std::fs::read(&image_path)
        .with_context(|| format!("Failed to read image: {}", image_path.display()))?;
    info!("Loaded {} ({} bytes)", image_path.display(), image.len());

    let environment = config.environment();
    let transport = build_transport(&config)?;
    let orchestrator = AnalysisOrchestrator::new(transport, config.pipeline_settings());

    if !args.quiet {
        eprintln!("🧪 Analyzing {}", image_path.display());
        if environment.local_inference_available {
            eprintln!("   Ollama: {}", config.inference.base_url);
            eprintln!(
                "   Models: {} → {}",
                config.inference.vision_model, config.inference.refinement_model
            );
            eprintln!("   Timeout: {}s per call", config.inference.timeout_seconds);
        } else {
            eprintln!("   Local inference disabled, using demo analysis");
        }
    }

    let spinner = make_spinner(&args);
    let outcome = orchestrator.analyze(&image, &environment).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    info!("Outcome: {}", outcome.label());

    let settings = orchestrator.settings();
    let report = AnalysisReport {
        metadata: ReportMetadata {
            image: image_path.display().to_string(),
            image_bytes: image.len(),
            analyzed_at: Utc::now(),
            vision_model: settings.vision_model.clone(),
            refinement_model: settings.refinement_model.clone(),
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        result: outcome,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    match args.output {
        Some(ref path) => {
            report::write_output(&output, path)
                .with_context(|| format!("Failed to write result to {}", path.display()))?;
            if !args.quiet {
                eprintln!("✅ Result saved to: {}", path.display());
            }
        }
        None => println!("{}", output),
    }

    match report.result {
        AnalysisOutcome::ErrorFallback { .. } => Ok(3),
        _ => Ok(0),
    }
}

/// Pick the transport for this host.
fn build_transport(config: &Config) -> Result<Arc<dyn InferenceTransport>> {
    if config.inference.local_available {
        Ok(Arc::new(OllamaTransport::new(config.ollama_settings())?))
    } else {
        Ok(Arc::new(UnavailableTransport))
    }
}

fn make_spinner(args: &Args) -> Option<ProgressBar> {
    if args.quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("Waiting for the model...");
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
