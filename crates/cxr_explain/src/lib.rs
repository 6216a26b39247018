//! # cxr_explain
//!
//! Explainability tools for cxr-rs: activation/gradient capture, Grad-CAM
//! importance maps and heatmap overlays.
//!
//! This crate provides:
//! - [`ActivationCapture`] / [`GradientCapture`] - tensors observed at a
//!   target layer, returned as values from explicit forward/backward calls
//! - [`SaliencyEngine`] - per-class Grad-CAM transactions
//! - [`grad_cam`] and [`ImportanceMap`] - the combine and normalise steps
//! - [`composite`] - JET-coloured overlay at the original image resolution

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod activation;
mod attribution;
mod engine;
mod error;
mod heatmap;

pub use activation::{ActivationCapture, GradientCapture};
pub use attribution::{grad_cam, ImportanceMap};
pub use engine::SaliencyEngine;
pub use error::{ExplainError, Result};
pub use heatmap::{composite, jet, resize_map, HEATMAP_WEIGHT, IMAGE_WEIGHT};
