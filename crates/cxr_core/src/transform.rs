//! Transform trait for image preprocessing.

use image::RgbImage;

use crate::error::Result;

/// A transform applied to a decoded RGB image before tensor conversion.
///
/// Transforms are composed into a pipeline by [`Compose`] and must leave
/// their input untouched: they take ownership and return a new image, so a
/// caller that needs the original keeps its own copy.
///
/// # Implementation Notes
///
/// - Transforms must be deterministic
/// - Transforms should return `Result` instead of panicking
/// - Transforms should document their effect on image dimensions
///
/// # Example
///
/// ```rust,ignore
/// use cxr_core::{ImageTransform, Result};
/// use image::RgbImage;
///
/// struct FlipHorizontal;
///
/// impl ImageTransform for FlipHorizontal {
///     fn apply(&self, image: RgbImage) -> Result<RgbImage> {
///         Ok(image::imageops::flip_horizontal(&image))
///     }
/// }
/// ```
pub trait ImageTransform: Send + Sync {
    /// Apply the transform to an image.
    fn apply(&self, image: RgbImage) -> Result<RgbImage>;

    /// Get the name of this transform for logging/debugging.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A composed transform that applies multiple transforms in sequence.
#[derive(Default)]
pub struct Compose {
    transforms: Vec<Box<dyn ImageTransform>>,
}

impl Compose {
    /// Create a new empty composition.
    #[must_use]
    pub fn new() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    /// Add a transform to the composition.
    pub fn push<T: ImageTransform + 'static>(&mut self, transform: T) {
        self.transforms.push(Box::new(transform));
    }

    /// Builder-style variant of [`Compose::push`].
    #[must_use]
    pub fn then<T: ImageTransform + 'static>(mut self, transform: T) -> Self {
        self.push(transform);
        self
    }

    /// Number of transforms in the composition.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Whether the composition is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl ImageTransform for Compose {
    fn apply(&self, mut image: RgbImage) -> Result<RgbImage> {
        for transform in &self.transforms {
            image = transform.apply(image)?;
        }
        Ok(image)
    }

    fn name(&self) -> &str {
        "Compose"
    }
}

impl std::fmt::Debug for Compose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.transforms.iter().map(|t| t.name()).collect();
        f.debug_struct("Compose").field("transforms", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    struct Invert;

    impl ImageTransform for Invert {
        fn apply(&self, mut image: RgbImage) -> Result<RgbImage> {
            image::imageops::invert(&mut image);
            Ok(image)
        }

        fn name(&self) -> &str {
            "Invert"
        }
    }

    #[test]
    fn test_compose_applies_in_order() {
        let compose = Compose::new().then(Invert).then(Invert);
        assert_eq!(compose.len(), 2);

        let image = RgbImage::from_pixel(2, 2, Rgb([10, 20, 30]));
        let out = compose.apply(image.clone()).unwrap();
        assert_eq!(out, image);
    }

    #[test]
    fn test_compose_debug_lists_names() {
        let compose = Compose::new().then(Invert);
        assert!(format!("{:?}", compose).contains("Invert"));
    }
}
