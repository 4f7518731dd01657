//! Inference modules for compound analysis.
//!
//! This module provides the transports and the two-stage orchestrator.

pub mod error;
pub mod orchestrator;
pub mod transport;

pub use orchestrator::{AnalysisOrchestrator, Environment, PipelineSettings};
pub use transport::{InferenceTransport, OllamaSettings, OllamaTransport, UnavailableTransport};
