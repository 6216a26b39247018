//! # cxr_models
//!
//! Model definitions for cxr-rs.
//!
//! ## Models
//! - [`DenseNet`] - DenseNet feature extractor (DenseNet-121 by default)
//! - [`ChestXrayClassifier`] - DenseNet backbone with a dropout + linear
//!   multi-label head producing one sigmoid probability per disease class
//!
//! ## Instrumented forward
//!
//! Intermediate activations are exposed as ordinary return values instead
//! of hook callbacks: [`ChestXrayClassifier::forward_until`] stops at a
//! [`TargetLayer`] and returns its output, and
//! [`ChestXrayClassifier::forward_from`] resumes from such an activation.
//!
//! ## Checkpoints
//! - [`load_weights`] / [`save_weights`] - named MessagePack records with a
//!   JSON metadata sidecar

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
pub mod classifier;
pub mod densenet;
pub mod norm;
pub mod target;

pub use checkpoint::{
    load_weights, load_weights_with_config, save_weights, CheckpointError, CheckpointMetadata,
    ARCH_NAME,
};
pub use classifier::{ChestXrayClassifier, ChestXrayClassifierConfig};
pub use densenet::{DenseBlock, DenseLayer, DenseNet, DenseNetConfig, Stem, Transition};
pub use norm::{FrozenBatchNorm, FrozenBatchNormConfig};
pub use target::TargetLayer;
