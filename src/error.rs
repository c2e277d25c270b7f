use thiserror::Error;

/// Errors raised by the detection pipeline.
///
/// `InvalidGeometry` is handled locally (the detection is skipped). The other
/// variants are surfaced to whoever drives the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid detection geometry: {0}")]
    InvalidGeometry(String),
    #[error("inference failed: {0}")]
    InferenceFailure(String),
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
}

impl PipelineError {
    pub(crate) fn inference(err: anyhow::Error) -> Self {
        PipelineError::InferenceFailure(format!("{err:#}"))
    }

    pub(crate) fn model(name: &str, err: anyhow::Error) -> Self {
        PipelineError::ModelUnavailable(format!("{name}: {err:#}"))
    }
}
