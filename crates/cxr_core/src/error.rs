//! Error types for cxr_core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur while preparing inputs and outputs.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The bytes are not a decodable image, or were declared as something else.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Threshold outside the closed interval [0, 1].
    #[error("Invalid threshold: {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold {
        /// The rejected value.
        value: f32,
    },

    /// Invalid tensor shape provided.
    #[error("Invalid shape: expected {expected}, got {got}")]
    InvalidShape {
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        got: String,
    },

    /// Numeric backend or device is unavailable.
    #[error("Device error: {0}")]
    Device(String),

    /// Image could not be serialised.
    #[error("Encode error: {0}")]
    Encode(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl From<image::ImageError> for CoreError {
    fn from(err: image::ImageError) -> Self {
        CoreError::Decode(err.to_string())
    }
}
