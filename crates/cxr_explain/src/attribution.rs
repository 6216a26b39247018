//! Grad-CAM importance maps.

use burn::prelude::*;
use ndarray::Array2;

use crate::error::{ExplainError, Result};

/// Single-channel class importance over the feature-map grid.
///
/// Values are non-negative and normalised by the map's own maximum, so they
/// lie in `[0, 1]`. A map whose maximum is zero stays all-zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceMap {
    /// Normalised values, `(height, width)`.
    values: Array2<f32>,
    /// Class the map explains, if known.
    target_class: Option<usize>,
}

impl ImportanceMap {
    /// Build a map from raw scores: clamp at zero, then divide by the maximum.
    ///
    /// Non-finite scores are treated as zero.
    pub fn from_raw(mut values: Array2<f32>) -> Self {
        values.mapv_inplace(|v| if v.is_finite() { v.max(0.0) } else { 0.0 });

        let max = values.iter().copied().fold(0.0f32, f32::max);
        if max > 0.0 {
            values.mapv_inplace(|v| (v / max).min(1.0));
        }

        Self {
            values,
            target_class: None,
        }
    }

    /// Set the target class.
    #[must_use]
    pub fn with_target_class(mut self, class: usize) -> Self {
        self.target_class = Some(class);
        self
    }

    /// The class this map explains.
    pub fn target_class(&self) -> Option<usize> {
        self.target_class
    }

    /// Normalised values, `(height, width)`.
    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    /// Grid height.
    pub fn height(&self) -> usize {
        self.values.nrows()
    }

    /// Grid width.
    pub fn width(&self) -> usize {
        self.values.ncols()
    }

    /// Largest value (1.0 unless the map is all-zero).
    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(0.0, f32::max)
    }

    /// Whether every cell is zero.
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }
}

/// Compute a Grad-CAM map from a captured activation and its gradient.
///
/// # Arguments
///
/// * `activations` - Target layer output `(1, channels, h, w)`
/// * `gradients` - Gradient of the class score w.r.t. `activations`
///
/// # Returns
///
/// Importance map of shape `(h, w)`: per-channel weights are the spatial
/// mean of the gradient, the weighted activations are averaged across
/// channels, then clamped at zero and max-normalised.
pub fn grad_cam<B: Backend>(activations: Tensor<B, 4>, gradients: Tensor<B, 4>) -> Result<ImportanceMap> {
    let dims = activations.dims();
    if dims != gradients.dims() {
        return Err(ExplainError::InvalidShape(format!(
            "activation {:?} and gradient {:?} differ",
            dims,
            gradients.dims()
        )));
    }
    let [batch, _channels, height, width] = dims;
    if batch != 1 {
        return Err(ExplainError::InvalidShape(format!(
            "expected a single image, got batch of {}",
            batch
        )));
    }

    // Global average pool the gradients: (1, C, h, w) -> (1, C, 1, 1)
    let weights = gradients.mean_dim(3).mean_dim(2);

    // Weight the activations and average across channels: (1, 1, h, w)
    let cam = (activations * weights).mean_dim(1);

    let raw = cam
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| ExplainError::Numeric(format!("{:?}", e)))?;
    let raw = Array2::from_shape_vec((height, width), raw)
        .map_err(|e| ExplainError::InvalidShape(e.to_string()))?;

    Ok(ImportanceMap::from_raw(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxr_core::backend::NdArray;
    use ndarray::array;

    type TestBackend = NdArray;

    #[test]
    fn test_from_raw_normalises() {
        let map = ImportanceMap::from_raw(array![[-1.0, 0.0], [2.0, 4.0]]);
        assert_eq!(map.values(), &array![[0.0, 0.0], [0.5, 1.0]]);
        assert_eq!(map.max(), 1.0);
    }

    #[test]
    fn test_from_raw_all_negative_stays_zero() {
        let map = ImportanceMap::from_raw(array![[-3.0, -1.0], [-0.5, 0.0]]);
        assert!(map.is_zero());
        assert!(map.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_from_raw_non_finite() {
        let map = ImportanceMap::from_raw(array![[f32::NAN, 1.0], [f32::INFINITY, 2.0]]);
        assert_eq!(map.values(), &array![[0.0, 0.5], [0.0, 1.0]]);
    }

    #[test]
    fn test_grad_cam_shape() {
        let device = Default::default();
        let activations = Tensor::<TestBackend, 4>::ones([1, 16, 7, 7], &device);
        let gradients = Tensor::<TestBackend, 4>::ones([1, 16, 7, 7], &device);

        let cam = grad_cam(activations, gradients).unwrap();
        assert_eq!((cam.height(), cam.width()), (7, 7));
        // uniform positive evidence -> uniform map at 1
        assert!(cam.values().iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_zero_gradient_gives_zero_map() {
        let device = Default::default();
        let activations = Tensor::<TestBackend, 4>::ones([1, 4, 3, 3], &device);
        let gradients = Tensor::<TestBackend, 4>::zeros([1, 4, 3, 3], &device);

        let cam = grad_cam(activations, gradients).unwrap();
        assert!(cam.is_zero());
    }

    #[test]
    fn test_grad_cam_weights_channels() {
        let device = Default::default();
        // channel 0 lights the left column, channel 1 the right column
        let activations = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(vec![1.0f32, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0], [1, 2, 2, 2]),
            &device,
        );
        // only channel 1 matters for the class
        let gradients = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(vec![0.0f32, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0], [1, 2, 2, 2]),
            &device,
        );

        let cam = grad_cam(activations, gradients).unwrap();
        assert_eq!(cam.values(), &array![[0.0, 1.0], [0.0, 1.0]]);
    }

    #[test]
    fn test_grad_cam_shape_mismatch() {
        let device = Default::default();
        let activations = Tensor::<TestBackend, 4>::ones([1, 4, 3, 3], &device);
        let gradients = Tensor::<TestBackend, 4>::ones([1, 4, 2, 2], &device);
        assert!(matches!(
            grad_cam(activations, gradients),
            Err(ExplainError::InvalidShape(_))
        ));
    }
}
