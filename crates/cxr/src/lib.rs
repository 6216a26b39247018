//! # cxr
//!
//! Multi-label chest X-ray classification with Grad-CAM explanations in Rust.
//!
//! cxr-rs classifies a radiograph into 14 independent disease labels and
//! renders a class saliency heatmap for every positive label:
//!
//! - **Preprocessing**: decode, resize to 224x224, channel-first `[0, 1]` tensor
//! - **Classifier**: DenseNet-121 backbone with a dropout + linear sigmoid head
//! - **Prediction**: per-class threshold with an argmax fallback
//! - **Explainability**: Grad-CAM at a configurable layer, JET overlay at
//!   the original resolution, PNG + base-64 transport encoding
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cxr::prelude::*;
//!
//! let device = resolve_device("cpu")?;
//! let ctx = InferenceContext::<ExplainBackend>::from_checkpoint("models/densenet121", device, TargetLayer::FinalNorm)?;
//!
//! let input = InputImage::new(std::fs::read("chest.png")?).with_content_type("image/png");
//! let bundle = analyze(&ctx, &input, 0.5)?;
//! println!("{}", serde_json::to_string_pretty(&bundle)?);
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default): CPU backend using ndarray
//! - `backend-wgpu`: GPU backend using WGPU

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod context;
mod error;
mod pipeline;

// Re-export all crates
pub use cxr_analysis as analysis;
pub use cxr_core as core;
pub use cxr_explain as explain;
pub use cxr_models as models;
pub use cxr_transforms as transforms;

pub use config::PipelineConfig;
pub use context::InferenceContext;
pub use error::{PipelineError, Result};
pub use pipeline::{
    analyze, analyze_with_probabilities, class_list, classify, encode, explain, predict,
    preprocess, service_info, ClassList, ExplanationSet, OutputBundle, ServiceInfo,
};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use cxr::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        analyze, classify, encode, explain, predict, preprocess, InferenceContext, OutputBundle,
        PipelineConfig, PipelineError,
    };

    #[cfg(feature = "backend-ndarray")]
    pub use cxr_core::backend::{resolve_device, ExplainBackend, InferBackend};
    pub use cxr_core::{InputTensor, Seed, CLASS_NAMES, NUM_CLASSES};

    pub use cxr_transforms::{InputImage, Preprocessor, PreprocessorConfig};

    pub use cxr_models::{
        load_weights, save_weights, ChestXrayClassifier, ChestXrayClassifierConfig,
        DenseNetConfig, TargetLayer,
    };

    pub use cxr_analysis::{ClassProbabilities, PredictionReport, PredictionSet, Threshold};

    pub use cxr_explain::{composite, grad_cam, ImportanceMap, SaliencyEngine};
}
