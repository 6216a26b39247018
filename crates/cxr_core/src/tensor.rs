//! Network input tensor type.

use burn::prelude::*;

use crate::error::{CoreError, Result};
use crate::shape::ImageShape;

/// A normalised network input wrapping a Burn tensor.
///
/// Holds a single RGB image in channel-first layout `(1, 3, H, W)` with
/// intensities in `[0, 1]`. The tensor is created once per request by the
/// preprocessor and is never mutated afterwards.
///
/// # Type Parameters
///
/// * `B` - The Burn backend type
#[derive(Debug, Clone)]
pub struct InputTensor<B: Backend> {
    inner: Tensor<B, 4>,
    shape: ImageShape,
}

impl<B: Backend> InputTensor<B> {
    /// Create a new input tensor from a Burn tensor.
    ///
    /// # Errors
    ///
    /// Returns an error if the tensor is not a single 3-channel image.
    pub fn new(tensor: Tensor<B, 4>) -> Result<Self> {
        let shape = ImageShape::from_dims(&tensor.dims())?;
        if shape.batch() != 1 || shape.channels() != 3 {
            return Err(CoreError::InvalidShape {
                expected: "(1, 3, H, W)".to_string(),
                got: shape.to_string(),
            });
        }
        Ok(Self {
            inner: tensor,
            shape,
        })
    }

    /// Build an input tensor from channel-first `f32` values.
    ///
    /// # Errors
    ///
    /// Returns an error if `values.len()` does not match `3 * height * width`.
    pub fn from_chw(values: Vec<f32>, height: usize, width: usize, device: &B::Device) -> Result<Self> {
        let shape = ImageShape::new(1, 3, height, width);
        if values.len() != shape.numel() {
            return Err(CoreError::InvalidShape {
                expected: format!("{} values for {}", shape.numel(), shape),
                got: format!("{} values", values.len()),
            });
        }
        let tensor = Tensor::<B, 4>::from_data(TensorData::new(values, shape.as_array()), device);
        Ok(Self {
            inner: tensor,
            shape,
        })
    }

    /// Create an all-zero (black) input of the given spatial size.
    pub fn zeros(height: usize, width: usize, device: &B::Device) -> Self {
        let shape = ImageShape::new(1, 3, height, width);
        Self {
            inner: Tensor::zeros(shape.as_array(), device),
            shape,
        }
    }

    /// Get the shape metadata.
    #[must_use]
    pub const fn shape(&self) -> ImageShape {
        self.shape
    }

    /// Get a reference to the underlying Burn tensor.
    #[must_use]
    pub const fn inner(&self) -> &Tensor<B, 4> {
        &self.inner
    }

    /// Consume self and return the underlying Burn tensor.
    #[must_use]
    pub fn into_inner(self) -> Tensor<B, 4> {
        self.inner
    }

    /// Get the device the tensor is on.
    pub fn device(&self) -> B::Device {
        self.inner.device()
    }

    /// Clone the tensor to a new device.
    pub fn to_device(&self, device: &B::Device) -> Self {
        Self {
            inner: self.inner.clone().to_device(device),
            shape: self.shape,
        }
    }
}

#[cfg(all(test, feature = "backend-ndarray"))]
mod tests {
    use super::*;
    use crate::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_zeros_input() {
        let device = Default::default();
        let input = InputTensor::<TestBackend>::zeros(224, 224, &device);
        assert_eq!(input.shape(), ImageShape::network_input());
        let sum: f32 = input.inner().clone().sum().into_scalar().elem();
        assert_eq!(sum, 0.0);
    }

    #[test]
    fn test_from_chw_length_mismatch() {
        let device = Default::default();
        let result = InputTensor::<TestBackend>::from_chw(vec![0.0; 10], 4, 4, &device);
        assert!(matches!(result, Err(CoreError::InvalidShape { .. })));
    }

    #[test]
    fn test_new_rejects_grayscale() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 4>::zeros([1, 1, 8, 8], &device);
        assert!(InputTensor::new(tensor).is_err());
    }
}
