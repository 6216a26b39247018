//! Error types for explanation.

use thiserror::Error;

use cxr_models::TargetLayer;

/// Result type alias for explanation operations.
pub type Result<T> = std::result::Result<T, ExplainError>;

/// Errors that can occur while generating saliency maps.
#[derive(Error, Debug)]
pub enum ExplainError {
    /// The target layer did not produce a capture during the pass.
    #[error("Capture missing at layer '{layer}': {reason}")]
    CaptureMissing {
        /// The configured target layer.
        layer: TargetLayer,
        /// What was not observed.
        reason: String,
    },

    /// Requested class is outside the model's outputs.
    #[error("Class index {index} out of range for {n_classes} outputs")]
    InvalidClass {
        /// The requested index.
        index: usize,
        /// Number of model outputs.
        n_classes: usize,
    },

    /// Tensors or images with unexpected dimensions.
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// Tensor data could not be read back.
    #[error("Numeric error: {0}")]
    Numeric(String),
}
