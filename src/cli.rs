//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::{Path, PathBuf};

/// Image formats accepted for upload.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// ChemLens - describe chemical compound images with a local vision model
///
/// Sends the image to a vision model for a description, then to a text model
/// for a formal rewrite. Without a local Ollama runtime, prints a demo analysis.
///
/// Examples:
///   chemlens benzene.png
///   chemlens hexane.jpg --vision-model llava:13b --timeout 600
///   chemlens hexane.jpg --format json --output result.json
///   chemlens hexane.jpg --demo
///   chemlens --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Image of the compound (jpg, jpeg, png)
    #[arg(value_name = "IMAGE", required_unless_present = "init_config")]
    pub image: Option<PathBuf>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL", value_name = "URL")]
    pub ollama_url: Option<String>,

    /// Image-capable model for the description stage
    #[arg(long, env = "CHEMLENS_VISION_MODEL", value_name = "MODEL")]
    pub vision_model: Option<String>,

    /// Text model for the academic rewrite stage
    #[arg(long, env = "CHEMLENS_REFINEMENT_MODEL", value_name = "MODEL")]
    pub refinement_model: Option<String>,

    /// Per-call timeout in seconds
    ///
    /// Vision models on CPU can take several minutes. Default: from config or 120s.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Skip inference and print the demo analysis
    ///
    /// Use on hosts without a local model runtime.
    #[arg(long, env = "CHEMLENS_DEMO")]
    pub demo: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .chemlens.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the result to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .chemlens.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Image path, empty if not set (validate first).
    pub fn image_path(&self) -> &Path {
        self.image.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        let image = match self.image {
            Some(ref p) => p,
            None => return Err("An image path is required".to_string()),
        };

        if !image.exists() {
            return Err(format!("Image does not exist: {}", image.display()));
        }
        if !image.is_file() {
            return Err(format!("Image path is not a file: {}", image.display()));
        }

        let ext_ok = image
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !ext_ok {
            return Err(format!(
                "Unsupported image type: {} (expected one of: {})",
                image.display(),
                SUPPORTED_EXTENSIONS.join(", ")
            ));
        }

        match std::fs::metadata(image) {
            Ok(meta) if meta.len() == 0 => {
                return Err(format!("Image is empty: {}", image.display()));
            }
            Ok(_) => {}
            Err(e) => return Err(format!("Cannot read image {}: {}", image.display(), e)),
        }

        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
