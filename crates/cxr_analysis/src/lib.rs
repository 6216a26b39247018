//! # cxr_analysis
//!
//! Prediction utilities for cxr-rs: thresholding, fallback and reporting.
//!
//! This crate provides:
//! - [`Threshold`] - validated decision threshold in `[0, 1]`
//! - [`ClassProbabilities`] - the 14 per-class sigmoid outputs
//! - [`predict`] - thresholded [`PredictionSet`] with an argmax fallback
//! - [`PredictionReport`] - plain-text table of all class probabilities

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod predict;
mod report;

pub use predict::{predict, ClassProbabilities, Prediction, PredictionSet, Threshold};
pub use report::{PredictionReport, ReportRow};
