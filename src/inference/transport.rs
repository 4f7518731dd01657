//! Transports for reaching the inference runtime.
//!
//! The orchestrator only sees the [`InferenceTransport`] trait:
//! - [`OllamaTransport`]: live HTTP calls to `/api/generate`
//! - [`UnavailableTransport`]: stands in where no local runtime exists

use crate::inference::error::{truncate_body, InferenceError};
use crate::models::InferenceRequest;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Sends one request and returns the full response text.
#[async_trait]
pub trait InferenceTransport: Send + Sync {
    async fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError>;

    /// Whether this transport can reach a runtime at all.
    fn is_available(&self) -> bool {
        true
    }
}

/// Ollama generate API request.
#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<&'a str>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama generate API response. Other fields are ignored.
#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Settings for the live transport.
#[derive(Debug, Clone)]
pub struct OllamaSettings {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub temperature: f32,
}

/// Live transport against a local Ollama server.
pub struct OllamaTransport {
    settings: OllamaSettings,
    http_client: reqwest::Client,
}

impl OllamaTransport {
    pub fn new(settings: OllamaSettings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(settings, http_client))
    }

    /// Use a preconfigured client. The client's own timeout applies.
    pub fn with_client(settings: OllamaSettings, http_client: reqwest::Client) -> Self {
        Self {
            settings,
            http_client,
        }
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.settings.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl InferenceTransport for OllamaTransport {
    async fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
        let url = self.generate_url();

        let body = OllamaGenerateRequest {
            model: &request.model,
            prompt: &request.prompt,
            images: request.image.as_deref().into_iter().collect(),
            stream: false,
            options: OllamaOptions {
                temperature: self.settings.temperature,
            },
        };

        debug!(
            "POST {} model={} prompt_chars={} images={}",
            url,
            request.model,
            request.prompt.len(),
            body.images.len()
        );

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                InferenceError::from_send_error(
                    &e,
                    &self.settings.base_url,
                    self.settings.timeout_seconds,
                )
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            InferenceError::Communication(format!("failed to read response body: {}", e))
        })?;

        parse_generate_response(status, &text)
    }
}

/// Classify a completed HTTP exchange.
pub fn parse_generate_response(status: StatusCode, body: &str) -> Result<String, InferenceError> {
    if !status.is_success() {
        return Err(InferenceError::Rejected {
            status: status.as_u16(),
            body: truncate_body(body),
        });
    }

    match serde_json::from_str::<OllamaGenerateResponse>(body) {
        Ok(r) => Ok(r.response),
        Err(_) => Err(InferenceError::UnexpectedFormat {
            body: truncate_body(body),
        }),
    }
}

/// Transport for hosts without a local runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableTransport;

#[async_trait]
impl InferenceTransport for UnavailableTransport {
    async fn generate(&self, _request: &InferenceRequest) -> Result<String, InferenceError> {
        Err(InferenceError::Communication(
            "local inference runtime is not available".to_string(),
        ))
    }

    fn is_available(&self) -> bool {
        false
    }
}
