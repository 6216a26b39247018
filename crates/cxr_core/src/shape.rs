//! Image tensor shape metadata.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Side length of the square network input.
pub const INPUT_SIZE: usize = 224;

/// Shape metadata for channel-first image tensors.
///
/// Follows the convention `(B, C, H, W)`:
/// - `B`: Batch size
/// - `C`: Channels
/// - `H`: Height in pixels
/// - `W`: Width in pixels
///
/// # Example
///
/// ```rust
/// use cxr_core::ImageShape;
///
/// let shape = ImageShape::new(1, 3, 224, 224);
/// assert_eq!(shape.channels(), 3);
/// assert_eq!(shape.numel(), 3 * 224 * 224);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageShape {
    batch: usize,
    channels: usize,
    height: usize,
    width: usize,
}

impl ImageShape {
    /// Create a new shape with the specified dimensions.
    #[must_use]
    pub const fn new(batch: usize, channels: usize, height: usize, width: usize) -> Self {
        Self {
            batch,
            channels,
            height,
            width,
        }
    }

    /// The shape of a single RGB network input, `(1, 3, 224, 224)`.
    #[must_use]
    pub const fn network_input() -> Self {
        Self::new(1, 3, INPUT_SIZE, INPUT_SIZE)
    }

    /// Create a shape from a slice of dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice doesn't contain exactly 4 elements.
    ///
    /// # Example
    ///
    /// ```rust
    /// use cxr_core::ImageShape;
    ///
    /// let shape = ImageShape::from_dims(&[1, 3, 32, 48]).unwrap();
    /// assert_eq!(shape.width(), 48);
    /// ```
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        match dims {
            [b, c, h, w] => Ok(Self::new(*b, *c, *h, *w)),
            _ => Err(CoreError::InvalidShape {
                expected: "4 dimensions (batch, channels, height, width)".to_string(),
                got: format!("{:?}", dims),
            }),
        }
    }

    /// Get the batch size.
    #[must_use]
    pub const fn batch(&self) -> usize {
        self.batch
    }

    /// Get the number of channels.
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Get the height.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Get the width.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Get the total number of elements.
    #[must_use]
    pub const fn numel(&self) -> usize {
        self.batch * self.channels * self.height * self.width
    }

    /// Convert to an array.
    #[must_use]
    pub const fn as_array(&self) -> [usize; 4] {
        [self.batch, self.channels, self.height, self.width]
    }
}

impl std::fmt::Display for ImageShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(B={}, C={}, H={}, W={})",
            self.batch, self.channels, self.height, self.width
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_input_shape() {
        let shape = ImageShape::network_input();
        assert_eq!(shape.as_array(), [1, 3, 224, 224]);
        assert_eq!(shape.numel(), 150_528);
    }

    #[test]
    fn test_from_dims_invalid() {
        assert!(ImageShape::from_dims(&[3, 224, 224]).is_err());
        assert!(ImageShape::from_dims(&[1, 3, 224, 224, 1]).is_err());
    }

    #[test]
    fn test_shape_serde() {
        let shape = ImageShape::new(1, 3, 8, 8);
        let json = serde_json::to_string(&shape).unwrap();
        let decoded: ImageShape = serde_json::from_str(&json).unwrap();
        assert_eq!(shape, decoded);
    }

    #[test]
    fn test_shape_display() {
        let shape = ImageShape::new(1, 3, 7, 7);
        assert_eq!(shape.to_string(), "(B=1, C=3, H=7, W=7)");
    }
}
