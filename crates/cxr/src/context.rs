//! Process-wide inference state, passed explicitly to every pipeline call.

use std::path::Path;

use burn::module::{AutodiffModule, Module};
use burn::tensor::backend::AutodiffBackend;

use cxr_models::{load_weights, ChestXrayClassifier, TargetLayer};
use cxr_transforms::{Preprocessor, PreprocessorConfig};

use crate::config::PipelineConfig;
use crate::error::Result;

/// A loaded classifier with everything a request needs.
///
/// Built once at startup and read-only afterwards. Requests only borrow
/// it; all tensors and captures they create are their own.
///
/// # Type Parameters
///
/// * `B` - Gradient-tracking backend; plain inference runs on
///   `B::InnerBackend`
#[derive(Debug)]
pub struct InferenceContext<B: AutodiffBackend> {
    /// Gradient-tracked copy for saliency (frozen parameters, no dropout).
    saliency_model: ChestXrayClassifier<B>,
    /// Inference copy without gradient tracking.
    model: ChestXrayClassifier<B::InnerBackend>,
    device: B::Device,
    target_layer: TargetLayer,
    preprocessor: Preprocessor,
}

impl<B: AutodiffBackend> InferenceContext<B> {
    /// Wrap an initialised classifier.
    pub fn new(model: ChestXrayClassifier<B>, device: B::Device, target_layer: TargetLayer) -> Self {
        if !model.backbone().has_layer(target_layer) {
            tracing::warn!(
                "Target layer '{}' is not part of the backbone, saliency will fail",
                target_layer
            );
        }

        let model = model.no_grad().without_dropout();
        let inference = model.valid();

        Self {
            saliency_model: model,
            model: inference,
            device,
            target_layer,
            preprocessor: Preprocessor::default(),
        }
    }

    /// Use a custom preprocessor configuration.
    #[must_use]
    pub fn with_preprocessor(mut self, config: PreprocessorConfig) -> Self {
        self.preprocessor = Preprocessor::new(config);
        self
    }

    /// Load a checkpoint and build the context.
    ///
    /// # Errors
    ///
    /// Fails with a checkpoint error if the model is missing or does not
    /// match the architecture.
    pub fn from_checkpoint(
        path: impl AsRef<Path>,
        device: B::Device,
        target_layer: TargetLayer,
    ) -> Result<Self> {
        let path = path.as_ref();
        let (model, _config) = load_weights::<B>(path, &device)?;
        tracing::info!("Loaded model from {}", path.display());
        Ok(Self::new(model, device, target_layer))
    }

    /// Load the checkpoint named in `config` and apply its settings.
    pub fn from_config(config: &PipelineConfig, device: B::Device) -> Result<Self> {
        let path = config.model_path.as_ref().ok_or_else(|| {
            crate::error::PipelineError::Config("model_path is not set".to_string())
        })?;
        Ok(Self::from_checkpoint(path, device, config.target_layer)?
            .with_preprocessor(config.preprocessor_config()))
    }

    /// Inference classifier (no gradient tracking).
    pub fn model(&self) -> &ChestXrayClassifier<B::InnerBackend> {
        &self.model
    }

    /// Gradient-tracked classifier used by the saliency engine.
    pub fn saliency_model(&self) -> &ChestXrayClassifier<B> {
        &self.saliency_model
    }

    /// Compute device.
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Layer observed by the saliency engine.
    pub fn target_layer(&self) -> TargetLayer {
        self.target_layer
    }

    /// Input preprocessor.
    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }
}
