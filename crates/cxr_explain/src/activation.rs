//! Activation and gradient captures.
//!
//! Both are plain values owned by one saliency invocation. Nothing is
//! registered on the model, so concurrent requests sharing a classifier
//! cannot observe each other's tensors.

use burn::prelude::*;

use cxr_models::TargetLayer;

/// Output of the target layer captured during one forward pass.
#[derive(Debug, Clone)]
pub struct ActivationCapture<B: Backend> {
    layer: TargetLayer,
    activation: Tensor<B, 4>,
}

impl<B: Backend> ActivationCapture<B> {
    /// Create a new activation capture.
    pub fn new(layer: TargetLayer, activation: Tensor<B, 4>) -> Self {
        Self { layer, activation }
    }

    /// The layer the activation was taken from.
    pub fn layer(&self) -> TargetLayer {
        self.layer
    }

    /// The captured activation `(1, channels, h, w)`.
    pub fn activation(&self) -> &Tensor<B, 4> {
        &self.activation
    }

    /// Shape of the captured activation.
    pub fn dims(&self) -> [usize; 4] {
        self.activation.dims()
    }
}

/// Gradient of one class score with respect to a captured activation.
#[derive(Debug, Clone)]
pub struct GradientCapture<B: Backend> {
    layer: TargetLayer,
    class_index: usize,
    score: f32,
    gradient: Tensor<B, 4>,
}

impl<B: Backend> GradientCapture<B> {
    /// Create a new gradient capture.
    pub fn new(layer: TargetLayer, class_index: usize, score: f32, gradient: Tensor<B, 4>) -> Self {
        Self {
            layer,
            class_index,
            score,
            gradient,
        }
    }

    /// The layer the gradient was taken at.
    pub fn layer(&self) -> TargetLayer {
        self.layer
    }

    /// The class whose score was differentiated.
    pub fn class_index(&self) -> usize {
        self.class_index
    }

    /// The class probability at the time of the backward pass.
    pub fn score(&self) -> f32 {
        self.score
    }

    /// The gradient tensor, same shape as the activation.
    pub fn gradient(&self) -> &Tensor<B, 4> {
        &self.gradient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxr_core::backend::NdArray;

    #[test]
    fn test_activation_capture() {
        let device = Default::default();
        let activation = Tensor::<NdArray, 4>::zeros([1, 8, 7, 7], &device);
        let capture = ActivationCapture::new(TargetLayer::FinalNorm, activation);

        assert_eq!(capture.layer(), TargetLayer::FinalNorm);
        assert_eq!(capture.dims(), [1, 8, 7, 7]);
    }

    #[test]
    fn test_gradient_capture() {
        let device = Default::default();
        let gradient = Tensor::<NdArray, 4>::ones([1, 8, 7, 7], &device);
        let capture = GradientCapture::new(TargetLayer::DenseBlock(4), 3, 0.75, gradient);

        assert_eq!(capture.class_index(), 3);
        assert_eq!(capture.score(), 0.75);
        assert_eq!(capture.gradient().dims(), [1, 8, 7, 7]);
    }
}
