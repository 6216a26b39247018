//! Image preprocessing: raw bytes to a normalised network input.
//!
//! The steps mirror a classic `Resize -> ToTensor` pipeline:
//! 1. decode any common format into a 3-channel RGB image
//! 2. resize to `size x size` with a fixed interpolation filter
//! 3. scale intensities to `[0, 1]` and lay them out channel-first
//!
//! The decoded image is returned untouched next to the tensor so that
//! heatmaps can be composited at the original resolution.

use burn::prelude::*;
use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use cxr_core::{Compose, CoreError, ImageTransform, InputTensor, Result, INPUT_SIZE};

/// Raw image upload: bytes plus the declared content type, if any.
#[derive(Debug, Clone)]
pub struct InputImage {
    bytes: Vec<u8>,
    content_type: Option<String>,
}

impl InputImage {
    /// Wrap raw bytes with no declared content type.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: None,
        }
    }

    /// Attach a declared content type (e.g. `image/png`).
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// The raw bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The declared content type.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Reject uploads that declare a non-image content type.
    pub fn validate(&self) -> Result<()> {
        if let Some(ct) = &self.content_type {
            if !ct.trim().to_ascii_lowercase().starts_with("image/") {
                return Err(CoreError::Decode(format!(
                    "content type '{}' is not an image (expected image/*)",
                    ct
                )));
            }
        }
        if self.bytes.is_empty() {
            return Err(CoreError::Decode("empty image buffer".to_string()));
        }
        Ok(())
    }
}

/// Interpolation filter used when resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    /// Nearest neighbour.
    Nearest,
    /// Bilinear (triangle kernel, antialiased when shrinking).
    #[default]
    Bilinear,
    /// Bicubic (Catmull-Rom).
    Bicubic,
    /// Lanczos with window 3.
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Bilinear => FilterType::Triangle,
            ResizeFilter::Bicubic => FilterType::CatmullRom,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Resize to exact dimensions, ignoring aspect ratio.
#[derive(Debug, Clone, Copy)]
pub struct Resize {
    width: u32,
    height: u32,
    filter: ResizeFilter,
}

impl Resize {
    /// Create a new resize transform.
    #[must_use]
    pub const fn new(width: u32, height: u32, filter: ResizeFilter) -> Self {
        Self {
            width,
            height,
            filter,
        }
    }
}

impl ImageTransform for Resize {
    fn apply(&self, image: RgbImage) -> Result<RgbImage> {
        if self.width == 0 || self.height == 0 {
            return Err(CoreError::InvalidShape {
                expected: "non-zero target size".to_string(),
                got: format!("{}x{}", self.width, self.height),
            });
        }
        if image.dimensions() == (self.width, self.height) {
            return Ok(image);
        }
        Ok(imageops::resize(&image, self.width, self.height, self.filter.into()))
    }

    fn name(&self) -> &str {
        "Resize"
    }
}

/// Configuration for [`Preprocessor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessorConfig {
    /// Side length of the square network input.
    pub size: usize,
    /// Interpolation filter for the resize step.
    pub filter: ResizeFilter,
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            size: INPUT_SIZE,
            filter: ResizeFilter::Bilinear,
        }
    }
}

/// Output of [`Preprocessor::preprocess`].
#[derive(Debug, Clone)]
pub struct Preprocessed<B: Backend> {
    /// Normalised `(1, 3, size, size)` network input.
    pub tensor: InputTensor<B>,
    /// The decoded image at its original resolution.
    pub original: RgbImage,
}

/// Decodes raw image bytes into network inputs.
#[derive(Debug)]
pub struct Preprocessor {
    config: PreprocessorConfig,
    transforms: Compose,
}

impl Preprocessor {
    /// Create a preprocessor from config.
    #[must_use]
    pub fn new(config: PreprocessorConfig) -> Self {
        let size = config.size as u32;
        let transforms = Compose::new().then(Resize::new(size, size, config.filter));
        Self { config, transforms }
    }

    /// Get the config.
    #[must_use]
    pub fn config(&self) -> &PreprocessorConfig {
        &self.config
    }

    /// Decode, resize and tensorise an uploaded image.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Decode`] if the content type is not an image or
    /// the bytes cannot be decoded.
    pub fn preprocess<B: Backend>(
        &self,
        input: &InputImage,
        device: &B::Device,
    ) -> Result<Preprocessed<B>> {
        input.validate()?;
        self.preprocess_bytes(input.bytes(), device)
    }

    /// Same as [`Preprocessor::preprocess`] for bytes without metadata.
    pub fn preprocess_bytes<B: Backend>(
        &self,
        bytes: &[u8],
        device: &B::Device,
    ) -> Result<Preprocessed<B>> {
        let original = decode_rgb(bytes)?;
        let (w, h) = original.dimensions();

        let resized = self.transforms.apply(original.clone())?;
        let tensor = to_tensor(&resized, device)?;

        tracing::debug!(
            "Preprocessed {}x{} image into tensor {}",
            w,
            h,
            tensor.shape()
        );

        Ok(Preprocessed { tensor, original })
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(PreprocessorConfig::default())
    }
}

/// Decode any supported image format into 8-bit RGB.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        return Err(CoreError::Decode("empty image buffer".to_string()));
    }
    let decoded = image::load_from_memory(bytes)?;
    Ok(decoded.to_rgb8())
}

/// Convert an RGB image to a channel-first tensor with values in `[0, 1]`.
pub fn to_tensor<B: Backend>(image: &RgbImage, device: &B::Device) -> Result<InputTensor<B>> {
    let (w, h) = image.dimensions();
    let (w, h) = (w as usize, h as usize);
    let plane = w * h;

    let mut values = vec![0.0f32; 3 * plane];
    for (x, y, pixel) in image.enumerate_pixels() {
        let offset = y as usize * w + x as usize;
        for c in 0..3 {
            values[c * plane + offset] = f32::from(pixel[c]) / 255.0;
        }
    }

    InputTensor::from_chw(values, h, w, device)
}
