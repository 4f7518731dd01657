//! Inference failure taxonomy.

use crate::models::FailureKind;
use thiserror::Error;

/// Longest slice of a raw response body carried in an error.
const MAX_BODY_CHARS: usize = 2000;

/// Error returned by a single inference call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    /// The endpoint could not be reached or did not answer in time.
    #[error("{0}")]
    Communication(String),

    /// The endpoint answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Success status, but the body had no string `response` field.
    #[error("missing `response` text field in body: {body}")]
    UnexpectedFormat { body: String },
}

impl InferenceError {
    pub fn kind(&self) -> FailureKind {
        match self {
            InferenceError::Communication(_) => FailureKind::CommunicationFailure,
            InferenceError::Rejected { .. } => FailureKind::RequestRejected,
            InferenceError::UnexpectedFormat { .. } => FailureKind::UnexpectedResponseFormat,
        }
    }

    /// Classify a reqwest send failure.
    pub fn from_send_error(err: &reqwest::Error, base_url: &str, timeout_seconds: u64) -> Self {
        if err.is_timeout() {
            InferenceError::Communication(format!(
                "request to {} timed out after {}s",
                base_url, timeout_seconds
            ))
        } else if err.is_connect() {
            InferenceError::Communication(format!(
                "cannot connect to {}. Is Ollama running? ({})",
                base_url, err
            ))
        } else {
            InferenceError::Communication(format!("failed to send request: {}", err))
        }
    }
}

/// Trim a body so a huge HTML error page does not flood the output.
pub(crate) fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_BODY_CHARS) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
