//! Two-stage analysis pipeline with graceful fallback.
//!
//! Stage 1 sends the image to a vision model for a raw description.
//! Stage 2 sends that description to a text model for a formal rewrite.
//! When no local runtime exists the configured demo text is returned instead.

use crate::inference::error::InferenceError;
use crate::inference::transport::InferenceTransport;
use crate::models::{AnalysisOutcome, ImagePayload, InferenceRequest, Stage};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Capability descriptor supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment {
    pub local_inference_available: bool,
}

impl Environment {
    pub fn local() -> Self {
        Self {
            local_inference_available: true,
        }
    }

    pub fn restricted() -> Self {
        Self {
            local_inference_available: false,
        }
    }
}

/// Models, prompts, and fallback text for the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub vision_model: String,
    pub refinement_model: String,
    pub vision_prompt: String,
    pub refinement_prompt: String,
    pub demo_text: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            vision_model: "llava:latest".to_string(),
            refinement_model: "gemma:2b".to_string(),
            vision_prompt: VISION_PROMPT.to_string(),
            refinement_prompt: REFINEMENT_PROMPT.to_string(),
            demo_text: DEMO_ANALYSIS.to_string(),
        }
    }
}

/// Runs one analysis per call. Holds no per-call state.
pub struct AnalysisOrchestrator {
    transport: Arc<dyn InferenceTransport>,
    settings: PipelineSettings,
}

impl AnalysisOrchestrator {
    pub fn new(transport: Arc<dyn InferenceTransport>, settings: PipelineSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Analyze an image. Never fails: every error becomes an `ErrorFallback`.
    pub async fn analyze(&self, image: &[u8], env: &Environment) -> AnalysisOutcome {
        if !env.local_inference_available || !self.transport.is_available() {
            info!("Local inference unavailable, returning demo analysis");
            return AnalysisOutcome::DemoFallback {
                text: self.settings.demo_text.clone(),
            };
        }

        let image = ImagePayload::new(image);
        if image.is_empty() {
            warn!("Image payload is empty; the vision model will likely reject it");
        }
        debug!("Image payload: {} bytes", image.len());

        let description = match self.describe(image).await {
            Ok(text) => text,
            Err(e) => return error_fallback(Stage::Vision, e),
        };

        match self.refine(description).await {
            Ok(text) => AnalysisOutcome::Success { text },
            Err(e) => error_fallback(Stage::Refinement, e),
        }
    }

    /// Stage 1: image to raw description.
    async fn describe(&self, image: ImagePayload<'_>) -> Result<String, InferenceError> {
        let request = InferenceRequest::vision(
            &self.settings.vision_model,
            &self.settings.vision_prompt,
            image,
        );
        self.run_stage(Stage::Vision, &request).await
    }

    /// Stage 2: raw description to formal text.
    async fn refine(&self, description: String) -> Result<String, InferenceError> {
        let prompt = format!("{}\n\n{}", self.settings.refinement_prompt, description);
        let request = InferenceRequest::text(&self.settings.refinement_model, prompt);
        self.run_stage(Stage::Refinement, &request).await
    }

    async fn run_stage(
        &self,
        stage: Stage,
        request: &InferenceRequest,
    ) -> Result<String, InferenceError> {
        info!("Running {} stage with model {}", stage, request.model);
        let started = Instant::now();

        let result = self.transport.generate(request).await;

        match &result {
            Ok(text) => info!(
                "{} stage finished in {:.1}s ({} chars)",
                stage,
                started.elapsed().as_secs_f64(),
                text.len()
            ),
            Err(e) => warn!("{} stage failed ({}): {}", stage, e.kind(), e),
        }

        result
    }
}

fn error_fallback(stage: Stage, err: InferenceError) -> AnalysisOutcome {
    let kind = err.kind();
    AnalysisOutcome::ErrorFallback {
        kind,
        stage,
        message: format!("{} during {} stage: {}", kind, stage, err),
    }
}

/// Instruction for the vision stage.
pub const VISION_PROMPT: &str = "Analyze the chemical compound shown in the image. \
Identify the elements present, the functional groups, the bond types, \
the molecular nature of the compound, and its common uses.";

/// Instruction for the refinement stage. The stage-1 text follows it.
pub const REFINEMENT_PROMPT: &str = "Rewrite the following chemical analysis as formal \
academic text. Keep every factual claim, use clear headings, and do not add new facts.";

/// Fixed payload shown when no local runtime is reachable.
pub const DEMO_ANALYSIS: &str = r#"### Chemical Characterization of Hexane (C₆H₁₄)

**Composition:**
Hexane consists exclusively of carbon and hydrogen atoms in a 6:14 ratio.

**Bonding and Structure:**
All bonds are single covalent bonds. The molecule is a straight-chain alkane.

**Functional Groups:**
No functional groups are present, confirming a saturated hydrocarbon.

**Chemical Nature:**
Non-polar, chemically stable, and highly volatile.

**Applications:**
Used as an industrial solvent, fuel component, and in organic synthesis.
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FailureKind;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted results and records every request it receives.
    struct ScriptedTransport {
        available: bool,
        script: Mutex<VecDeque<Result<String, InferenceError>>>,
        calls: Mutex<Vec<InferenceRequest>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<String, InferenceError>>) -> Arc<Self> {
            Arc::new(Self {
                available: true,
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn unavailable() -> Arc<Self> {
            Arc::new(Self {
                available: false,
                script: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<InferenceRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl InferenceTransport for ScriptedTransport {
        async fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
            self.calls.lock().unwrap().push(request.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .expect("transport called more times than scripted")
        }

        fn is_available(&self) -> bool {
            self.available
        }
    }

    /// Answers every request with the same text, for repeat-call checks.
    struct EchoTransport;

    #[async_trait]
    impl InferenceTransport for EchoTransport {
        async fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
            Ok(format!("{}:{}", request.model, request.prompt.len()))
        }
    }

    fn orchestrator(transport: Arc<dyn InferenceTransport>) -> AnalysisOrchestrator {
        AnalysisOrchestrator::new(transport, PipelineSettings::default())
    }

    fn connection_refused() -> InferenceError {
        InferenceError::Communication("cannot connect to http://localhost:11434".to_string())
    }

    #[test]
    fn test_restricted_environment_returns_demo_without_calls() {
        let transport = ScriptedTransport::new(vec![]);
        let orch = orchestrator(transport.clone());

        let outcome =
            tokio_test::block_on(orch.analyze(b"<fake-jpeg>", &Environment::restricted()));

        assert_eq!(
            outcome,
            AnalysisOutcome::DemoFallback {
                text: DEMO_ANALYSIS.to_string()
            }
        );
        assert!(outcome.text().contains("Hexane"));
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn test_unavailable_transport_returns_demo_without_calls() {
        let transport = ScriptedTransport::unavailable();
        let mut settings = PipelineSettings::default();
        settings.demo_text = "custom demo".to_string();
        let orch = AnalysisOrchestrator::new(transport.clone(), settings);

        let outcome = tokio_test::block_on(orch.analyze(b"img", &Environment::local()));

        assert_eq!(
            outcome,
            AnalysisOutcome::DemoFallback {
                text: "custom demo".to_string()
            }
        );
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn test_vision_failure_skips_refinement() {
        let transport = ScriptedTransport::new(vec![Err(connection_refused())]);
        let orch = orchestrator(transport.clone());

        let outcome = tokio_test::block_on(orch.analyze(b"<fake-jpeg>", &Environment::local()));

        match outcome {
            AnalysisOutcome::ErrorFallback {
                kind,
                stage,
                message,
            } => {
                assert_eq!(kind, FailureKind::CommunicationFailure);
                assert_eq!(stage, Stage::Vision);
                assert!(message.starts_with("communication failure"));
                assert!(message.contains("cannot connect"));
            }
            other => panic!("expected ErrorFallback, got {:?}", other),
        }
        assert_eq!(transport.calls().len(), 1);
    }

    #[test]
    fn test_refinement_failure_after_vision_success() {
        let transport = ScriptedTransport::new(vec![
            Ok("contains C-C bonds".to_string()),
            Err(InferenceError::Rejected {
                status: 404,
                body: "model 'gemma:2b' not found".to_string(),
            }),
        ]);
        let orch = orchestrator(transport.clone());

        let outcome = tokio_test::block_on(orch.analyze(b"<fake-jpeg>", &Environment::local()));

        match &outcome {
            AnalysisOutcome::ErrorFallback { kind, stage, message } => {
                assert_eq!(*kind, FailureKind::RequestRejected);
                assert_eq!(*stage, Stage::Refinement);
                assert!(message.contains("404"));
            }
            other => panic!("expected ErrorFallback, got {:?}", other),
        }

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].model, "gemma:2b");
        assert!(calls[1].image.is_none());
        assert!(calls[1].prompt.ends_with("contains C-C bonds"));
        assert!(calls[1].prompt.starts_with(REFINEMENT_PROMPT));
    }

    #[test]
    fn test_both_stages_succeed() {
        let transport = ScriptedTransport::new(vec![
            Ok("contains C-C bonds".to_string()),
            Ok("Formally, the compound exhibits...".to_string()),
        ]);
        let orch = orchestrator(transport.clone());

        let outcome = tokio_test::block_on(orch.analyze(b"<fake-jpeg>", &Environment::local()));

        assert_eq!(
            outcome,
            AnalysisOutcome::Success {
                text: "Formally, the compound exhibits...".to_string()
            }
        );

        let calls = transport.calls();
        assert_eq!(calls[0].model, "llava:latest");
        assert_eq!(calls[0].prompt, VISION_PROMPT);
        assert_eq!(
            calls[0].image.as_deref(),
            Some(ImagePayload::new(b"<fake-jpeg>").to_base64().as_str())
        );
    }

    #[test]
    fn test_vision_shape_failure_is_not_communication_failure() {
        let transport = ScriptedTransport::new(vec![Err(InferenceError::UnexpectedFormat {
            body: r#"{"done":true}"#.to_string(),
        })]);
        let orch = orchestrator(transport.clone());

        let outcome = tokio_test::block_on(orch.analyze(b"img", &Environment::local()));

        match outcome {
            AnalysisOutcome::ErrorFallback { kind, message, .. } => {
                assert_eq!(kind, FailureKind::UnexpectedResponseFormat);
                assert!(message.contains(r#"{"done":true}"#));
            }
            other => panic!("expected ErrorFallback, got {:?}", other),
        }
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_repeat_calls_yield_identical_outcomes() {
        let orch = orchestrator(Arc::new(EchoTransport));

        let first = orch.analyze(b"<fake-jpeg>", &Environment::local()).await;
        let second = orch.analyze(b"<fake-jpeg>", &Environment::local()).await;

        assert!(matches!(first, AnalysisOutcome::Success { .. }));
        assert_eq!(first, second);
    }
}
