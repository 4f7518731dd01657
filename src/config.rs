//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.chemlens.toml` files. It is read once at startup; the orchestrator
//! only ever sees the values derived from it.

use crate::inference::orchestrator::{DEMO_ANALYSIS, REFINEMENT_PROMPT, VISION_PROMPT};
use crate::inference::{Environment, OllamaSettings, PipelineSettings};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".chemlens.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Inference endpoint and model settings.
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Instruction prompts.
    #[serde(default)]
    pub prompts: PromptConfig,

    /// Demo fallback settings.
    #[serde(default)]
    pub demo: DemoConfig,
}

/// Inference runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Ollama API URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Image-capable model.
    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    /// Text-only model for the rewrite pass.
    #[serde(default = "default_refinement_model")]
    pub refinement_model: String,

    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Whether a local runtime is reachable from this host.
    /// Set to false on hosted deployments to always serve the demo text.
    #[serde(default = "default_true")]
    pub local_available: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            vision_model: default_vision_model(),
            refinement_model: default_refinement_model(),
            timeout_seconds: default_timeout(),
            temperature: default_temperature(),
            local_available: true,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_vision_model() -> String {
    "llava:latest".to_string()
}

fn default_refinement_model() -> String {
    "gemma:2b".to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_temperature() -> f32 {
    0.2
}

fn default_true() -> bool {
    true
}

/// Instruction prompts for both stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default = "default_vision_prompt")]
    pub vision: String,

    #[serde(default = "default_refinement_prompt")]
    pub refinement: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            vision: default_vision_prompt(),
            refinement: default_refinement_prompt(),
        }
    }
}

fn default_vision_prompt() -> String {
    VISION_PROMPT.to_string()
}

fn default_refinement_prompt() -> String {
    REFINEMENT_PROMPT.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Text returned when local inference is unavailable.
    #[serde(default = "default_demo_text")]
    pub text: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            text: default_demo_text(),
        }
    }
}

fn default_demo_text() -> String {
    DEMO_ANALYSIS.to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.chemlens.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments and their env vars take precedence over the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.ollama_url {
            self.inference.base_url = url.clone();
        }
        if let Some(ref model) = args.vision_model {
            self.inference.vision_model = model.clone();
        }
        if let Some(ref model) = args.refinement_model {
            self.inference.refinement_model = model.clone();
        }
        if let Some(timeout) = args.timeout {
            self.inference.timeout_seconds = timeout;
        }

        // --demo can only switch inference off
        if args.demo {
            self.inference.local_available = false;
        }
    }

    pub fn environment(&self) -> Environment {
        if self.inference.local_available {
            Environment::local()
        } else {
            Environment::restricted()
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            vision_model: self.inference.vision_model.clone(),
            refinement_model: self.inference.refinement_model.clone(),
            vision_prompt: self.prompts.vision.clone(),
            refinement_prompt: self.prompts.refinement.clone(),
            demo_text: self.demo.text.clone(),
        }
    }

    pub fn ollama_settings(&self) -> OllamaSettings {
        OllamaSettings {
            base_url: self.inference.base_url.clone(),
            timeout_seconds: self.inference.timeout_seconds,
            temperature: self.inference.temperature,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
