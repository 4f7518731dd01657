//! Data models for the compound analyzer.
//!
//! This module contains the request and outcome types that flow through
//! a single analysis call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw image data supplied by the caller. Borrowed, never mutated.
#[derive(Debug, Clone, Copy)]
pub struct ImagePayload<'a>(&'a [u8]);

impl<'a> ImagePayload<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self(bytes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Standard base64 with padding, as the generate endpoint expects.
    pub fn to_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }
}

/// A single request to the inference endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceRequest {
    /// Model identifier, e.g. `llava:latest`.
    pub model: String,
    /// Instruction text sent as the prompt.
    pub prompt: String,
    /// Base64-encoded image, only for vision requests.
    pub image: Option<String>,
}

impl InferenceRequest {
    /// Build a request with the image attached.
    pub fn vision(model: &str, prompt: &str, image: ImagePayload<'_>) -> Self {
        Self {
            model: model.to_string(),
            prompt: prompt.to_string(),
            image: Some(image.to_base64()),
        }
    }

    /// Build a text-only request.
    pub fn text(model: &str, prompt: String) -> Self {
        Self {
            model: model.to_string(),
            prompt,
            image: None,
        }
    }
}

/// Which pipeline stage produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Vision,
    Refinement,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vision => write!(f, "vision"),
            Stage::Refinement => write!(f, "refinement"),
        }
    }
}

/// Classification of a failed inference call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection refused, timeout, DNS failure.
    CommunicationFailure,
    /// Endpoint answered with a non-success status.
    RequestRejected,
    /// Success status but no usable text field.
    UnexpectedResponseFormat,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::CommunicationFailure => write!(f, "communication failure"),
            FailureKind::RequestRejected => write!(f, "request rejected"),
            FailureKind::UnexpectedResponseFormat => write!(f, "unexpected response format"),
        }
    }
}

/// The result of one `analyze` call. Always well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    /// Both stages succeeded; carries the refinement text untouched.
    Success { text: String },
    /// Local inference unavailable; carries the configured demo text.
    DemoFallback { text: String },
    /// A stage failed; `message` names the kind and the underlying detail.
    ErrorFallback {
        kind: FailureKind,
        stage: Stage,
        message: String,
    },
}

impl AnalysisOutcome {
    /// Text suitable for direct display.
    pub fn text(&self) -> &str {
        match self {
            AnalysisOutcome::Success { text } | AnalysisOutcome::DemoFallback { text } => text,
            AnalysisOutcome::ErrorFallback { message, .. } => message,
        }
    }

    /// Short machine-friendly label.
    pub fn label(&self) -> &'static str {
        match self {
            AnalysisOutcome::Success { .. } => "success",
            AnalysisOutcome::DemoFallback { .. } => "demo_fallback",
            AnalysisOutcome::ErrorFallback { .. } => "error_fallback",
        }
    }
}

/// Metadata about one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Path of the analyzed image, as given by the user.
    pub image: String,
    /// Size of the image in bytes.
    pub image_bytes: usize,
    /// Date and time of the analysis.
    pub analyzed_at: DateTime<Utc>,
    /// Model used for the description stage.
    pub vision_model: String,
    /// Model used for the rewrite stage.
    pub refinement_model: String,
    /// Wall-clock duration in seconds.
    pub duration_seconds: f64,
}

/// What gets rendered for the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metadata: ReportMetadata,
    pub result: AnalysisOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_request_encodes_image() {
        let req = InferenceRequest::vision("llava", "describe", ImagePayload::new(b"abc"));
        assert_eq!(req.image.as_deref(), Some("YWJj"));
        assert_eq!(req.model, "llava");
    }

    #[test]
    fn test_text_request_has_no_image() {
        let req = InferenceRequest::text("gemma", "rewrite".to_string());
        assert!(req.image.is_none());
    }

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(
            FailureKind::CommunicationFailure.to_string(),
            "communication failure"
        );
        assert_eq!(FailureKind::RequestRejected.to_string(), "request rejected");
        assert_eq!(
            FailureKind::UnexpectedResponseFormat.to_string(),
            "unexpected response format"
        );
    }

    #[test]
    fn test_outcome_text_and_label() {
        let outcome = AnalysisOutcome::ErrorFallback {
            kind: FailureKind::RequestRejected,
            stage: Stage::Vision,
            message: "request rejected: 404".to_string(),
        };
        assert_eq!(outcome.text(), "request rejected: 404");
        assert_eq!(outcome.label(), "error_fallback");

        let ok = AnalysisOutcome::Success {
            text: "done".to_string(),
        };
        assert_eq!(ok.label(), "success");
        assert_eq!(ok.text(), "done");
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let outcome = AnalysisOutcome::DemoFallback {
            text: "demo".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "demo_fallback");
        assert_eq!(json["text"], "demo");
    }
}
