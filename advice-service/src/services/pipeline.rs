//! The request pipeline: ingest → classify → compose → generate → sanitize.
//!
//! Each stage returns an explicit result; the first failure ends the run and
//! its message is what the caller sees.

use crate::services::classifier::{ClassificationResult, ClassifierError, ClassifierHandle};
use crate::services::ingest::{AttachmentIngestor, AttachmentRole, IngestError, RawSubmission};
use crate::services::metrics;
use crate::services::prompt;
use crate::services::providers::{ProviderError, TextProvider};
use crate::services::sanitizer;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No query provided")]
    MissingQuery,

    #[error("Required model files are missing")]
    ModelArtifactsMissing,

    #[error("{0}")]
    AttachmentSaveFailed(#[source] IngestError),

    #[error("Eye image classification failed: {0}")]
    ClassificationFailed(#[source] ClassifierError),

    #[error("Advice generation failed: {0}")]
    GenerationFailed(#[source] ProviderError),
}

impl PipelineError {
    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::MissingQuery => "missing_query",
            PipelineError::ModelArtifactsMissing => "model_artifacts_missing",
            PipelineError::AttachmentSaveFailed(_) => "attachment_save_failed",
            PipelineError::ClassificationFailed(_) => "classification_failed",
            PipelineError::GenerationFailed(_) => "generation_failed",
        }
    }
}

impl From<IngestError> for PipelineError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::MissingQuery => PipelineError::MissingQuery,
            err @ IngestError::SaveFailed { .. } => PipelineError::AttachmentSaveFailed(err),
        }
    }
}

impl From<ClassifierError> for PipelineError {
    fn from(err: ClassifierError) -> Self {
        match err {
            ClassifierError::ArtifactsMissing { .. } => PipelineError::ModelArtifactsMissing,
            other => PipelineError::ClassificationFailed(other),
        }
    }
}

impl From<ProviderError> for PipelineError {
    fn from(err: ProviderError) -> Self {
        PipelineError::GenerationFailed(err)
    }
}

/// Successful pipeline output.
#[derive(Debug, Clone)]
pub struct Advice {
    /// Sanitized markdown.
    pub text: String,
    pub classification: ClassificationResult,
}

/// Shared request context: built once at startup, cloned into handlers.
#[derive(Clone)]
pub struct AdvicePipeline {
    ingestor: AttachmentIngestor,
    classifier: Arc<ClassifierHandle>,
    provider: Arc<dyn TextProvider>,
}

async fn timed<T>(stage: &'static str, fut: impl Future<Output = T>) -> T {
    let start = Instant::now();
    let out = fut.await;
    metrics::record_stage(stage, start.elapsed());
    out
}

impl AdvicePipeline {
    pub fn new(
        ingestor: AttachmentIngestor,
        classifier: Arc<ClassifierHandle>,
        provider: Arc<dyn TextProvider>,
    ) -> Self {
        Self {
            ingestor,
            classifier,
            provider,
        }
    }

    pub fn classifier(&self) -> &ClassifierHandle {
        &self.classifier
    }

    pub fn provider(&self) -> &dyn TextProvider {
        self.provider.as_ref()
    }

    /// Run one request through every stage.
    pub async fn run(&self, submission: RawSubmission) -> Result<Advice, PipelineError> {
        let result = self.run_stages(submission).await;
        match &result {
            Ok(_) => metrics::record_outcome("success"),
            Err(e) => metrics::record_outcome(e.kind()),
        }
        result
    }

    async fn run_stages(&self, submission: RawSubmission) -> Result<Advice, PipelineError> {
        // Artifacts are checked before anything else so a broken deployment
        // fails every request the same way.
        self.classifier.ensure_artifacts().map_err(|e| {
            tracing::error!(error = ?e, "Classifier artifacts missing");
            PipelineError::from(e)
        })?;

        let ingested = timed("ingest", self.ingestor.ingest(submission)).await?;

        let classification = match ingested.attachment(AttachmentRole::EyeImage) {
            Some(eye) => {
                let label = timed("classify", self.classifier.classify(eye.bytes.clone()))
                    .await
                    .map_err(|e| {
                        tracing::error!(error = %e, path = %eye.path.display(), "Eye image classification failed");
                        PipelineError::from(e)
                    })?;
                tracing::info!(label = %label, "Eye image classified");
                metrics::record_classification(&label);
                ClassificationResult::Label(label)
            }
            None => ClassificationResult::NotApplicable,
        };

        let prompt = prompt::compose(&classification, ingested.query.as_str());

        tracing::info!(
            model = %self.provider.model(),
            prompt_len = prompt.len(),
            eye_disease = %classification,
            "Requesting advice"
        );

        let completion = timed("generate", self.provider.generate(&prompt))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Advice generation failed");
                PipelineError::from(e)
            })?;

        tracing::info!(
            input_tokens = completion.input_tokens,
            output_tokens = completion.output_tokens,
            finish_reason = ?completion.finish_reason,
            "Advice generated"
        );

        let text = sanitizer::sanitize(&completion.text);

        Ok(Advice {
            text,
            classification,
        })
    }
}
