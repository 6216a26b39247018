//! Multi-label chest X-ray classifier.

use burn::nn::{
    pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
    Dropout, DropoutConfig, Linear, LinearConfig, Relu,
};
use burn::prelude::*;
use burn::tensor::activation::sigmoid;
use serde::{Deserialize, Serialize};

use cxr_core::NUM_CLASSES;

use crate::densenet::{DenseNet, DenseNetConfig};
use crate::target::TargetLayer;

/// Configuration for [`ChestXrayClassifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChestXrayClassifierConfig {
    /// Backbone configuration.
    pub backbone: DenseNetConfig,
    /// Number of output labels.
    pub n_classes: usize,
    /// Dropout rate before the linear projection.
    pub dropout: f64,
}

impl Default for ChestXrayClassifierConfig {
    fn default() -> Self {
        Self {
            backbone: DenseNetConfig::densenet121(),
            n_classes: NUM_CLASSES,
            dropout: 0.2,
        }
    }
}

impl ChestXrayClassifierConfig {
    /// Create a config with a custom backbone and the standard 14-label head.
    pub fn new(backbone: DenseNetConfig) -> Self {
        Self {
            backbone,
            ..Default::default()
        }
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ChestXrayClassifier<B> {
        ChestXrayClassifier::new(self, device)
    }
}

/// DenseNet backbone with an independent-sigmoid multi-label head.
///
/// Head: `relu -> global average pool -> dropout -> linear -> sigmoid`.
/// Outputs are per-class probabilities, not a softmax distribution.
#[derive(Module, Debug)]
pub struct ChestXrayClassifier<B: Backend> {
    backbone: DenseNet<B>,
    gap: AdaptiveAvgPool2d,
    dropout: Dropout,
    fc: Linear<B>,
}

impl<B: Backend> ChestXrayClassifier<B> {
    /// Create a new classifier.
    pub fn new(config: &ChestXrayClassifierConfig, device: &B::Device) -> Self {
        let backbone = config.backbone.init(device);
        let gap = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let dropout = DropoutConfig::new(config.dropout).init();
        let fc = LinearConfig::new(backbone.num_features(), config.n_classes).init(device);

        Self {
            backbone,
            gap,
            dropout,
            fc,
        }
    }

    /// The feature extractor.
    pub fn backbone(&self) -> &DenseNet<B> {
        &self.backbone
    }

    /// Number of output labels.
    pub fn n_classes(&self) -> usize {
        self.fc.weight.dims()[1]
    }

    /// Replace dropout with the identity.
    ///
    /// Burn applies dropout whenever the backend tracks gradients, so the
    /// gradient-tracked copy used for saliency must drop it explicitly.
    #[must_use]
    pub fn without_dropout(mut self) -> Self {
        self.dropout = DropoutConfig::new(0.0).init();
        self
    }

    /// Forward pass returning logits of shape `(batch, n_classes)`.
    pub fn forward_logits(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = self.backbone.forward(x);
        self.head_logits(features)
    }

    /// Forward pass returning per-class probabilities.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        sigmoid(self.forward_logits(x))
    }

    /// Run the backbone up to `layer` and return its activation.
    ///
    /// Returns `None` if `layer` does not exist in the backbone.
    pub fn forward_until(&self, x: Tensor<B, 4>, layer: TargetLayer) -> Option<Tensor<B, 4>> {
        self.backbone.forward_until(x, layer)
    }

    /// Resume from the activation of `layer` and return probabilities.
    ///
    /// Returns `None` if `layer` does not exist in the backbone.
    pub fn forward_from(&self, activation: Tensor<B, 4>, layer: TargetLayer) -> Option<Tensor<B, 2>> {
        let features = self.backbone.forward_from(activation, layer)?;
        Some(sigmoid(self.head_logits(features)))
    }

    fn head_logits(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let out = Relu::new().forward(features);
        let out = self.gap.forward(out);
        let [batch, channels, _, _] = out.dims();
        let out = out.reshape([batch, channels]);
        let out = self.dropout.forward(out);
        self.fc.forward(out)
    }
}
