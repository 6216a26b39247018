//! Pipeline error type.

use thiserror::Error;

use cxr_core::CoreError;
use cxr_explain::ExplainError;
use cxr_models::CheckpointError;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Any failure of the inference-and-explanation pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Input preparation, thresholds, devices and encoding.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Model loading.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// Saliency generation.
    #[error(transparent)]
    Explain(#[from] ExplainError),

    /// Unreadable or invalid configuration.
    #[error("Config error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Whether the caller caused the failure (bad image or threshold).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Core(CoreError::Decode(_) | CoreError::InvalidThreshold { .. })
        )
    }

    /// Message safe to return to a caller.
    ///
    /// Client errors carry their detail; everything else is reported as a
    /// generic internal error.
    pub fn public_message(&self) -> String {
        if self.is_client_error() {
            self.to_string()
        } else {
            "Internal error while processing the image".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxr_models::TargetLayer;

    #[test]
    fn test_client_errors() {
        let err = PipelineError::from(CoreError::InvalidThreshold { value: 1.5 });
        assert!(err.is_client_error());
        assert!(err.public_message().contains("1.5"));

        let err = PipelineError::from(CoreError::Decode("not a png".into()));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_internal_errors_hide_detail() {
        let err = PipelineError::from(ExplainError::CaptureMissing {
            layer: TargetLayer::Transition(9),
            reason: "layer was not reached".into(),
        });
        assert!(!err.is_client_error());
        assert!(err.to_string().contains("transition9"));
        assert!(!err.public_message().contains("transition9"));

        let err = PipelineError::from(CoreError::Device("gpu".into()));
        assert!(!err.is_client_error());
    }
}
