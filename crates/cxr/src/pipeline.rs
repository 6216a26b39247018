//! Endpoint-facing pipeline calls.
//!
//! `preprocess -> classify -> predict -> explain -> encode`, plus
//! [`analyze`] which runs the whole chain and builds the [`OutputBundle`].

use std::time::Instant;

use image::RgbImage;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use burn::tensor::backend::AutodiffBackend;

use cxr_analysis::{ClassProbabilities, PredictionSet, Threshold};
use cxr_core::{InputTensor, CLASS_NAMES, NUM_CLASSES};
use cxr_explain::{composite, SaliencyEngine};
use cxr_transforms::{encode_image, InputImage, Preprocessed};

use crate::context::InferenceContext;
use crate::error::Result;

/// Decode and prepare an uploaded image.
pub fn preprocess<B: AutodiffBackend>(
    ctx: &InferenceContext<B>,
    input: &InputImage,
) -> Result<Preprocessed<B::InnerBackend>> {
    Ok(ctx.preprocessor().preprocess(input, ctx.device())?)
}

/// Per-class probabilities for a prepared input, without gradient tracking.
pub fn classify<B: AutodiffBackend>(
    ctx: &InferenceContext<B>,
    tensor: &InputTensor<B::InnerBackend>,
) -> Result<ClassProbabilities> {
    let probs = ctx.model().forward(tensor.inner().clone());
    Ok(ClassProbabilities::from_tensor(probs)?)
}

/// Classify and threshold a prepared input.
pub fn predict<B: AutodiffBackend>(
    ctx: &InferenceContext<B>,
    tensor: &InputTensor<B::InnerBackend>,
    threshold: Threshold,
) -> Result<PredictionSet> {
    let probs = classify(ctx, tensor)?;
    Ok(cxr_analysis::predict(&probs, threshold))
}

/// Render and encode one Grad-CAM overlay per predicted label.
///
/// Any failure aborts the whole step; no partial set is returned.
pub fn explain<B: AutodiffBackend>(
    ctx: &InferenceContext<B>,
    tensor: &InputTensor<B::InnerBackend>,
    original: &RgbImage,
    predictions: &PredictionSet,
) -> Result<ExplanationSet> {
    let engine = SaliencyEngine::new(ctx.saliency_model(), ctx.target_layer());
    let maps = engine.explain_classes(tensor, &predictions.class_indices())?;

    let mut entries = Vec::with_capacity(maps.len());
    for (prediction, map) in predictions.iter().zip(maps) {
        let overlay = composite(&map, original)?;
        entries.push((prediction.label, encode(&overlay)?));
        tracing::info!("Generated Grad-CAM for {}", prediction.label);
    }

    Ok(ExplanationSet { entries })
}

/// PNG + base-64 encoding of an image.
pub fn encode(image: &RgbImage) -> Result<String> {
    Ok(encode_image(image)?)
}

/// Run the full pipeline on one upload.
///
/// The threshold is validated before any computation.
pub fn analyze<B: AutodiffBackend>(
    ctx: &InferenceContext<B>,
    input: &InputImage,
    threshold: f32,
) -> Result<OutputBundle> {
    analyze_with_probabilities(ctx, input, threshold).map(|(bundle, _)| bundle)
}

/// [`analyze`], also returning the full probability vector the
/// predictions were thresholded from.
pub fn analyze_with_probabilities<B: AutodiffBackend>(
    ctx: &InferenceContext<B>,
    input: &InputImage,
    threshold: f32,
) -> Result<(OutputBundle, ClassProbabilities)> {
    let threshold = Threshold::new(threshold)?;
    let start = Instant::now();

    let Preprocessed { tensor, original } = preprocess(ctx, input)?;
    tracing::debug!("Input tensor {}, original {:?}", tensor.shape(), original.dimensions());

    let probabilities = classify(ctx, &tensor)?;
    let predictions = cxr_analysis::predict(&probabilities, threshold);
    tracing::info!(
        "Predicted {} label(s) at threshold {}: {:?}",
        predictions.len(),
        threshold,
        predictions.labels()
    );

    let gradcam_images = explain(ctx, &tensor, &original, &predictions)?;
    let original_image = encode(&original)?;

    tracing::debug!("Analysis finished in {:.2?}", start.elapsed());

    let bundle = OutputBundle {
        success: true,
        num_predictions: predictions.len(),
        threshold_used: threshold.value(),
        predictions,
        gradcam_images,
        original_image,
    };
    Ok((bundle, probabilities))
}

/// Encoded overlays keyed by label, in class-index order.
///
/// Serialises as a `{label: base64}` object.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplanationSet {
    entries: Vec<(&'static str, String)>,
}

impl ExplanationSet {
    /// Encoded overlay for `label`.
    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, image)| image.as_str())
    }

    /// Labels in order.
    pub fn labels(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(l, _)| *l).collect()
    }

    /// `(label, base64)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.entries.iter().map(|(l, image)| (*l, image.as_str()))
    }

    /// Number of overlays.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no overlays.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ExplanationSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, image) in &self.entries {
            map.serialize_entry(label, image)?;
        }
        map.end()
    }
}

/// Everything returned for one analysed image.
#[derive(Debug, Clone, Serialize)]
pub struct OutputBundle {
    /// Always true for a constructed bundle.
    pub success: bool,
    /// Positive labels and their probabilities.
    pub predictions: PredictionSet,
    /// Base-64 PNG overlay per positive label.
    pub gradcam_images: ExplanationSet,
    /// Base-64 PNG of the decoded upload.
    pub original_image: String,
    /// Number of positive labels.
    pub num_predictions: usize,
    /// Threshold applied.
    pub threshold_used: f32,
}

/// Service health summary.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    /// `"healthy"` once a model is loaded.
    pub status: &'static str,
    /// Compute device in use.
    pub device: String,
    /// Whether a classifier is loaded.
    pub model_loaded: bool,
}

/// Describe a running context.
pub fn service_info<B: AutodiffBackend>(ctx: &InferenceContext<B>) -> ServiceInfo {
    ServiceInfo {
        status: "healthy",
        device: format!("{:?}", ctx.device()),
        model_loaded: true,
    }
}

/// The class vocabulary.
#[derive(Debug, Clone, Serialize)]
pub struct ClassList {
    /// Class names in output order.
    pub classes: Vec<&'static str>,
    /// Number of classes.
    pub num_classes: usize,
}

/// List the disease classes in output order.
pub fn class_list() -> ClassList {
    ClassList {
        classes: CLASS_NAMES.to_vec(),
        num_classes: NUM_CLASSES,
    }
}
