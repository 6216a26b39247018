//! # cxr_core
//!
//! Core types and traits for cxr-rs chest X-ray inference.
//!
//! This crate provides:
//! - The fixed disease vocabulary ([`CLASS_NAMES`]) that defines output index alignment
//! - [`ImageShape`] for channel-first image tensor metadata
//! - [`InputTensor`] wrapper for Burn tensors with shape validation
//! - [`ImageTransform`] trait for composable image preprocessing
//! - [`Seed`] for reproducible weight initialisation
//! - Error types and backend/device helpers
//!
//! ## Shape Convention
//!
//! Network inputs follow the convention `(B, C, H, W)`:
//! - `B`: Batch size (always 1 for a single request)
//! - `C`: Colour channels (3, RGB)
//! - `H`, `W`: Spatial size (224 x 224 by default)
//!
//! ## Example
//!
//! ```rust,ignore
//! use cxr_core::{ImageShape, InputTensor, CLASS_NAMES};
//!
//! let shape = ImageShape::network_input();
//! assert_eq!(shape.as_array(), [1, 3, 224, 224]);
//! assert_eq!(CLASS_NAMES[2], "Effusion");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod labels;
mod seed;
mod shape;
mod tensor;
mod transform;

pub use error::{CoreError, Result};
pub use labels::{class_index, class_name, CLASS_NAMES, NUM_CLASSES};
pub use seed::Seed;
pub use shape::{ImageShape, INPUT_SIZE};
pub use tensor::InputTensor;
pub use transform::{Compose, ImageTransform};

/// Backend type aliases for convenience
pub mod backend {
    use crate::error::{CoreError, Result};

    pub use burn_autodiff::Autodiff;

    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::{NdArray, NdArrayDevice};

    #[cfg(feature = "backend-wgpu")]
    pub use burn_wgpu::{Wgpu, WgpuDevice};

    /// Backend used for gradient-tracked passes (saliency).
    #[cfg(feature = "backend-ndarray")]
    pub type ExplainBackend = Autodiff<NdArray>;

    /// Backend used for plain inference.
    #[cfg(feature = "backend-ndarray")]
    pub type InferBackend = NdArray;

    /// Resolve a device name for the ndarray backend.
    ///
    /// Only the CPU is available; any other name is a [`CoreError::Device`].
    #[cfg(feature = "backend-ndarray")]
    pub fn resolve_device(name: &str) -> Result<NdArrayDevice> {
        match name.trim().to_lowercase().as_str() {
            "cpu" | "default" | "" => Ok(NdArrayDevice::Cpu),
            other => Err(CoreError::Device(format!(
                "device '{}' is not available on the ndarray backend (use 'cpu')",
                other
            ))),
        }
    }

    /// Resolve a device name for the wgpu backend.
    #[cfg(feature = "backend-wgpu")]
    pub fn resolve_wgpu_device(name: &str) -> Result<WgpuDevice> {
        match name.trim().to_lowercase().as_str() {
            "gpu" | "default" | "" => Ok(WgpuDevice::DefaultDevice),
            "cpu" => Ok(WgpuDevice::Cpu),
            other => Err(CoreError::Device(format!("unknown wgpu device '{}'", other))),
        }
    }
}

#[cfg(all(test, feature = "backend-ndarray"))]
mod tests {
    use super::backend::*;

    #[test]
    fn test_resolve_cpu_device() {
        assert_eq!(resolve_device("cpu").unwrap(), NdArrayDevice::Cpu);
        assert_eq!(resolve_device(" CPU ").unwrap(), NdArrayDevice::Cpu);
    }

    #[test]
    fn test_resolve_unknown_device() {
        let err = resolve_device("cuda").unwrap_err();
        assert!(matches!(err, crate::CoreError::Device(_)));
    }
}
