//! Batch normalisation with frozen statistics.

use burn::module::Param;
use burn::prelude::*;

/// Configuration for [`FrozenBatchNorm`].
#[derive(Debug, Clone)]
pub struct FrozenBatchNormConfig {
    /// Number of channels.
    pub num_features: usize,
    /// Value added to the variance for numerical stability.
    pub epsilon: f64,
}

impl FrozenBatchNormConfig {
    /// Create a new config with the default epsilon (1e-5).
    pub fn new(num_features: usize) -> Self {
        Self {
            num_features,
            epsilon: 1e-5,
        }
    }

    /// Initialize with identity statistics (mean 0, variance 1, gamma 1, beta 0).
    pub fn init<B: Backend>(&self, device: &B::Device) -> FrozenBatchNorm<B> {
        let n = self.num_features;
        FrozenBatchNorm {
            gamma: Param::from_tensor(Tensor::ones([n], device)),
            beta: Param::from_tensor(Tensor::zeros([n], device)),
            running_mean: Param::from_tensor(Tensor::zeros([n], device)),
            running_var: Param::from_tensor(Tensor::ones([n], device)),
            epsilon: self.epsilon,
        }
    }
}

/// 2D batch normalisation that always uses its running statistics.
///
/// Burn's `BatchNorm` switches to batch statistics whenever the backend
/// tracks gradients. Saliency maps need gradients through an inference-mode
/// network, so every normalisation layer here is frozen.
#[derive(Module, Debug)]
pub struct FrozenBatchNorm<B: Backend> {
    /// Scale.
    pub gamma: Param<Tensor<B, 1>>,
    /// Shift.
    pub beta: Param<Tensor<B, 1>>,
    /// Running mean.
    pub running_mean: Param<Tensor<B, 1>>,
    /// Running variance.
    pub running_var: Param<Tensor<B, 1>>,
    epsilon: f64,
}

impl<B: Backend> FrozenBatchNorm<B> {
    /// Number of normalised channels.
    pub fn num_features(&self) -> usize {
        self.gamma.dims()[0]
    }

    /// Forward pass on `(batch, channels, height, width)` input.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let channels = self.num_features();

        let scale = self.gamma.val() / self.running_var.val().add_scalar(self.epsilon).sqrt();
        let shift = self.beta.val() - self.running_mean.val() * scale.clone();

        x * scale.reshape([1, channels, 1, 1]) + shift.reshape([1, channels, 1, 1])
    }
}
