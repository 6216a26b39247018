//! Per-class Grad-CAM transactions.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use cxr_core::{class_name, InputTensor};
use cxr_models::{ChestXrayClassifier, TargetLayer};

use crate::activation::{ActivationCapture, GradientCapture};
use crate::attribution::{grad_cam, ImportanceMap};
use crate::error::{ExplainError, Result};

/// Generates class saliency maps for one classifier and target layer.
///
/// Each call to [`SaliencyEngine::gradient`] runs its own forward/backward
/// pass from a fresh gradient-tracked copy of the captured activation, so
/// gradients never accumulate across classes and no state is left on the
/// model. The classifier should be built with
/// [`ChestXrayClassifier::without_dropout`] so repeated passes agree.
#[derive(Debug)]
pub struct SaliencyEngine<'a, B: AutodiffBackend> {
    model: &'a ChestXrayClassifier<B>,
    layer: TargetLayer,
}

impl<'a, B: AutodiffBackend> SaliencyEngine<'a, B> {
    /// Create an engine observing `layer` of `model`.
    pub fn new(model: &'a ChestXrayClassifier<B>, layer: TargetLayer) -> Self {
        Self { model, layer }
    }

    /// The observed layer.
    pub fn layer(&self) -> TargetLayer {
        self.layer
    }

    /// Forward `input` up to the target layer and keep its activation.
    ///
    /// # Errors
    ///
    /// [`ExplainError::CaptureMissing`] if the layer is not part of the model.
    pub fn capture(&self, input: &InputTensor<B::InnerBackend>) -> Result<ActivationCapture<B::InnerBackend>> {
        let x = Tensor::<B, 4>::from_inner(input.inner().clone());
        let activation = self
            .model
            .forward_until(x, self.layer)
            .ok_or_else(|| self.missing("layer was not reached during the forward pass"))?;

        tracing::trace!(layer = %self.layer, dims = ?activation.dims(), "Captured activation");
        Ok(ActivationCapture::new(self.layer, activation.inner()))
    }

    /// Differentiate the probability of `class` w.r.t. the captured activation.
    ///
    /// # Errors
    ///
    /// [`ExplainError::InvalidClass`] for an out-of-range class,
    /// [`ExplainError::CaptureMissing`] if the capture belongs to another
    /// layer or no gradient reaches it.
    pub fn gradient(
        &self,
        capture: &ActivationCapture<B::InnerBackend>,
        class: usize,
    ) -> Result<GradientCapture<B::InnerBackend>> {
        let n_classes = self.model.n_classes();
        if class >= n_classes {
            return Err(ExplainError::InvalidClass {
                index: class,
                n_classes,
            });
        }
        if capture.layer() != self.layer {
            return Err(self.missing(&format!("capture was taken at '{}'", capture.layer())));
        }

        let leaf = Tensor::<B, 4>::from_inner(capture.activation().clone()).require_grad();
        let probs = self
            .model
            .forward_from(leaf.clone(), self.layer)
            .ok_or_else(|| self.missing("layer was not reached during the backward pass"))?;

        let score = probs.slice([0..1, class..class + 1]).sum();
        let value: f32 = score.clone().inner().into_scalar().elem();

        let grads = score.backward();
        let gradient = leaf
            .grad(&grads)
            .ok_or_else(|| self.missing("no gradient reached the layer"))?;

        Ok(GradientCapture::new(self.layer, class, value, gradient))
    }

    /// Grad-CAM map for `class` from an existing capture.
    ///
    /// At [`TargetLayer::FinalNorm`] the activations are weighted after the
    /// head's ReLU, i.e. the features the classifier actually pools.
    pub fn explain(&self, capture: &ActivationCapture<B::InnerBackend>, class: usize) -> Result<ImportanceMap> {
        let gradient = self.gradient(capture, class)?;
        let map = grad_cam(self.combined_activation(capture), gradient.gradient().clone())?;
        Ok(map.with_target_class(class))
    }

    /// Activation entering the Grad-CAM combine step.
    fn combined_activation(&self, capture: &ActivationCapture<B::InnerBackend>) -> Tensor<B::InnerBackend, 4> {
        let activation = capture.activation().clone();
        match capture.layer() {
            TargetLayer::FinalNorm => activation.clamp_min(0.0),
            _ => activation,
        }
    }

    /// Grad-CAM maps for several classes of one input, in the given order.
    ///
    /// The input is forwarded once; each class then gets its own backward
    /// pass. The first failure aborts the batch.
    pub fn explain_classes(
        &self,
        input: &InputTensor<B::InnerBackend>,
        classes: &[usize],
    ) -> Result<Vec<ImportanceMap>> {
        let capture = self.capture(input)?;
        let mut maps = Vec::with_capacity(classes.len());

        for &class in classes {
            let map = self.explain(&capture, class).map_err(|e| {
                tracing::warn!(class, layer = %self.layer, error = %e, "Saliency failed");
                e
            })?;
            tracing::debug!(
                class,
                label = class_name(class).unwrap_or("?"),
                max = map.max(),
                "Generated saliency map"
            );
            maps.push(map);
        }

        Ok(maps)
    }

    fn missing(&self, reason: &str) -> ExplainError {
        ExplainError::CaptureMissing {
            layer: self.layer,
            reason: reason.to_string(),
        }
    }
}
