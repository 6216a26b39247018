//! DenseNet feature extractor.
//!
//! Huang et al., "Densely Connected Convolutional Networks", CVPR 2017.
//! Each dense layer sees the concatenation of every earlier feature map in
//! its block; transitions halve both channels and resolution.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    pool::{AvgPool2d, AvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
    PaddingConfig2d, Relu,
};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::norm::{FrozenBatchNorm, FrozenBatchNormConfig};
use crate::target::TargetLayer;

/// Configuration for [`DenseNet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseNetConfig {
    /// Number of input channels.
    pub in_channels: usize,
    /// Channels added by each dense layer.
    pub growth_rate: usize,
    /// Number of dense layers in each block.
    pub block_config: Vec<usize>,
    /// Channels produced by the stem convolution.
    pub num_init_features: usize,
    /// Bottleneck width multiplier (bottleneck = `bn_size * growth_rate`).
    pub bn_size: usize,
}

impl Default for DenseNetConfig {
    fn default() -> Self {
        Self::densenet121()
    }
}

impl DenseNetConfig {
    /// DenseNet-121: growth 32, blocks (6, 12, 24, 16), 64 initial features.
    pub fn densenet121() -> Self {
        Self {
            in_channels: 3,
            growth_rate: 32,
            block_config: vec![6, 12, 24, 16],
            num_init_features: 64,
            bn_size: 4,
        }
    }

    /// Create a custom config.
    pub fn new(growth_rate: usize, block_config: Vec<usize>, num_init_features: usize) -> Self {
        Self {
            growth_rate,
            block_config,
            num_init_features,
            ..Self::densenet121()
        }
    }

    /// Number of channels produced by the final feature layer.
    pub fn num_features(&self) -> usize {
        let n_blocks = self.block_config.len();
        let mut features = self.num_init_features;
        for (i, &n_layers) in self.block_config.iter().enumerate() {
            features += n_layers * self.growth_rate;
            if i + 1 != n_blocks {
                features /= 2;
            }
        }
        features
    }

    /// Initialize the backbone.
    pub fn init<B: Backend>(&self, device: &B::Device) -> DenseNet<B> {
        DenseNet::new(self, device)
    }
}

/// Stem: 7x7 stride-2 convolution, normalisation, ReLU and 3x3 max pool.
#[derive(Module, Debug)]
pub struct Stem<B: Backend> {
    conv0: Conv2d<B>,
    norm0: FrozenBatchNorm<B>,
    pool0: MaxPool2d,
}

impl<B: Backend> Stem<B> {
    /// Create a new stem.
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv0 = Conv2dConfig::new([in_channels, out_channels], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .init(device);
        let norm0 = FrozenBatchNormConfig::new(out_channels).init(device);
        let pool0 = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        Self { conv0, norm0, pool0 }
    }

    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv0.forward(x);
        let out = self.norm0.forward(out);
        let out = Relu::new().forward(out);
        self.pool0.forward(out)
    }
}

/// Bottleneck dense layer: BN-ReLU-Conv1x1-BN-ReLU-Conv3x3.
#[derive(Module, Debug)]
pub struct DenseLayer<B: Backend> {
    norm1: FrozenBatchNorm<B>,
    conv1: Conv2d<B>,
    norm2: FrozenBatchNorm<B>,
    conv2: Conv2d<B>,
}

impl<B: Backend> DenseLayer<B> {
    /// Create a new dense layer.
    pub fn new(in_channels: usize, growth_rate: usize, bn_size: usize, device: &B::Device) -> Self {
        let bottleneck = bn_size * growth_rate;

        let norm1 = FrozenBatchNormConfig::new(in_channels).init(device);
        let conv1 = Conv2dConfig::new([in_channels, bottleneck], [1, 1])
            .with_bias(false)
            .init(device);
        let norm2 = FrozenBatchNormConfig::new(bottleneck).init(device);
        let conv2 = Conv2dConfig::new([bottleneck, growth_rate], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);

        Self {
            norm1,
            conv1,
            norm2,
            conv2,
        }
    }

    /// Forward pass returning the input concatenated with the new features.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let relu = Relu::new();

        let out = relu.forward(self.norm1.forward(x.clone()));
        let out = self.conv1.forward(out);
        let out = relu.forward(self.norm2.forward(out));
        let out = self.conv2.forward(out);

        Tensor::cat(vec![x, out], 1)
    }
}

/// A block of densely connected layers.
#[derive(Module, Debug)]
pub struct DenseBlock<B: Backend> {
    layers: Vec<DenseLayer<B>>,
}

impl<B: Backend> DenseBlock<B> {
    /// Create a new dense block.
    pub fn new(
        n_layers: usize,
        in_channels: usize,
        growth_rate: usize,
        bn_size: usize,
        device: &B::Device,
    ) -> Self {
        let layers = (0..n_layers)
            .map(|i| DenseLayer::new(in_channels + i * growth_rate, growth_rate, bn_size, device))
            .collect();
        Self { layers }
    }

    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.layers.iter().fold(x, |out, layer| layer.forward(out))
    }
}

/// Transition: BN-ReLU-Conv1x1 followed by 2x2 average pooling.
#[derive(Module, Debug)]
pub struct Transition<B: Backend> {
    norm: FrozenBatchNorm<B>,
    conv: Conv2d<B>,
    pool: AvgPool2d,
}

impl<B: Backend> Transition<B> {
    /// Create a new transition layer.
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let norm = FrozenBatchNormConfig::new(in_channels).init(device);
        let conv = Conv2dConfig::new([in_channels, out_channels], [1, 1])
            .with_bias(false)
            .init(device);
        let pool = AvgPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        Self { norm, conv, pool }
    }

    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = Relu::new().forward(self.norm.forward(x));
        let out = self.conv.forward(out);
        self.pool.forward(out)
    }
}

/// One step of the feature extractor, borrowed from a [`DenseNet`].
enum Stage<'a, B: Backend> {
    Stem(&'a Stem<B>),
    Block(&'a DenseBlock<B>),
    Transition(&'a Transition<B>),
    Norm(&'a FrozenBatchNorm<B>),
}

impl<B: Backend> Stage<'_, B> {
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Stage::Stem(stem) => stem.forward(x),
            Stage::Block(block) => block.forward(x),
            Stage::Transition(transition) => transition.forward(x),
            Stage::Norm(norm) => norm.forward(x),
        }
    }
}

/// DenseNet feature extractor (without classifier).
///
/// Produces `(batch, num_features, H/32, W/32)` feature maps, i.e.
/// `(1, 1024, 7, 7)` for a 224x224 input with the DenseNet-121 config.
#[derive(Module, Debug)]
pub struct DenseNet<B: Backend> {
    stem: Stem<B>,
    blocks: Vec<DenseBlock<B>>,
    transitions: Vec<Transition<B>>,
    norm5: FrozenBatchNorm<B>,
}

impl<B: Backend> DenseNet<B> {
    /// Create a new DenseNet backbone.
    pub fn new(config: &DenseNetConfig, device: &B::Device) -> Self {
        let stem = Stem::new(config.in_channels, config.num_init_features, device);

        let n_blocks = config.block_config.len();
        let mut blocks = Vec::with_capacity(n_blocks);
        let mut transitions = Vec::with_capacity(n_blocks.saturating_sub(1));

        let mut channels = config.num_init_features;
        for (i, &n_layers) in config.block_config.iter().enumerate() {
            blocks.push(DenseBlock::new(
                n_layers,
                channels,
                config.growth_rate,
                config.bn_size,
                device,
            ));
            channels += n_layers * config.growth_rate;

            if i + 1 != n_blocks {
                transitions.push(Transition::new(channels, channels / 2, device));
                channels /= 2;
            }
        }

        let norm5 = FrozenBatchNormConfig::new(channels).init(device);

        Self {
            stem,
            blocks,
            transitions,
            norm5,
        }
    }

    /// Layers in execution order, paired with their addresses.
    fn stages(&self) -> Vec<(TargetLayer, Stage<'_, B>)> {
        let mut stages = vec![(TargetLayer::Stem, Stage::Stem(&self.stem))];
        for (i, block) in self.blocks.iter().enumerate() {
            stages.push((TargetLayer::DenseBlock(i + 1), Stage::Block(block)));
            if let Some(transition) = self.transitions.get(i) {
                stages.push((TargetLayer::Transition(i + 1), Stage::Transition(transition)));
            }
        }
        stages.push((TargetLayer::FinalNorm, Stage::Norm(&self.norm5)));
        stages
    }

    /// Addressable layers in execution order.
    pub fn layers(&self) -> Vec<TargetLayer> {
        self.stages().into_iter().map(|(layer, _)| layer).collect()
    }

    /// Whether `layer` exists in this network.
    pub fn has_layer(&self, layer: TargetLayer) -> bool {
        self.layers().contains(&layer)
    }

    /// Number of channels produced by the final feature layer.
    pub fn num_features(&self) -> usize {
        self.norm5.num_features()
    }

    /// Full forward pass through the feature extractor.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.stages()
            .iter()
            .fold(x, |out, (_, stage)| stage.forward(out))
    }

    /// Run the network up to and including `layer`, returning its output.
    ///
    /// Returns `None` if the layer never fires (it does not exist).
    pub fn forward_until(&self, x: Tensor<B, 4>, layer: TargetLayer) -> Option<Tensor<B, 4>> {
        let mut out = x;
        for (address, stage) in self.stages() {
            out = stage.forward(out);
            if address == layer {
                return Some(out);
            }
        }
        None
    }

    /// Resume the network from the output of `layer`.
    ///
    /// Returns `None` if the layer does not exist.
    pub fn forward_from(&self, activation: Tensor<B, 4>, layer: TargetLayer) -> Option<Tensor<B, 4>> {
        let stages = self.stages();
        let position = stages.iter().position(|(address, _)| *address == layer)?;

        Some(
            stages
                .iter()
                .skip(position + 1)
                .fold(activation, |out, (_, stage)| stage.forward(out)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxr_core::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny_config() -> DenseNetConfig {
        DenseNetConfig::new(4, vec![2, 2], 8)
    }

    #[test]
    fn test_densenet121_num_features() {
        assert_eq!(DenseNetConfig::densenet121().num_features(), 1024);
    }

    #[test]
    fn test_tiny_num_features() {
        // 8 + 2*4 = 16 -> 8 after transition, 8 + 2*4 = 16
        assert_eq!(tiny_config().num_features(), 16);
    }

    #[test]
    fn test_layer_order() {
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device);
        assert_eq!(
            model.layers(),
            vec![
                TargetLayer::Stem,
                TargetLayer::DenseBlock(1),
                TargetLayer::Transition(1),
                TargetLayer::DenseBlock(2),
                TargetLayer::FinalNorm,
            ]
        );
        assert!(!model.has_layer(TargetLayer::Transition(2)));
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::zeros([1, 3, 64, 64], &device);

        // stem /4, one transition /2
        let out = model.forward(x);
        assert_eq!(out.dims(), [1, 16, 8, 8]);
    }

    #[test]
    fn test_forward_until_then_from_matches_full_pass() {
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::ones([1, 3, 32, 32], &device);

        let full = model.forward(x.clone());
        let mid = model
            .forward_until(x, TargetLayer::Transition(1))
            .expect("transition1 exists");
        let resumed = model
            .forward_from(mid, TargetLayer::Transition(1))
            .expect("transition1 exists");

        let diff: f32 = (full - resumed).abs().max().into_scalar().elem();
        assert!(diff < 1e-5);
    }

    #[test]
    fn test_missing_layer_never_fires() {
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::zeros([1, 3, 32, 32], &device);

        assert!(model.forward_until(x.clone(), TargetLayer::DenseBlock(7)).is_none());
        assert!(model.forward_from(x, TargetLayer::Transition(5)).is_none());
    }
}
