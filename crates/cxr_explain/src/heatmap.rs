//! Heatmap rendering and overlay compositing.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, Rgb, RgbImage};
use ndarray::Array2;

use crate::attribution::ImportanceMap;
use crate::error::{ExplainError, Result};

/// Weight of the original image in the overlay blend.
pub const IMAGE_WEIGHT: f32 = 0.6;

/// Weight of the coloured heatmap in the overlay blend.
pub const HEATMAP_WEIGHT: f32 = 0.4;

/// JET colormap: blue at 0, through cyan, yellow, to red at 255.
pub fn jet(value: u8) -> Rgb<u8> {
    let x = value as f32 / 255.0;
    let channel = |offset: f32| {
        let v = (1.5 - (4.0 * x - offset).abs()).clamp(0.0, 1.0);
        (v * 255.0).round() as u8
    };
    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}

/// Bilinear resize of an importance map to `width` x `height`.
pub fn resize_map(map: &ImportanceMap, width: u32, height: u32) -> Result<Array2<f32>> {
    let (rows, cols) = (map.height(), map.width());
    if rows == 0 || cols == 0 {
        return Err(ExplainError::InvalidShape("empty importance map".to_string()));
    }

    let raw: Vec<f32> = map.values().iter().copied().collect();
    let grid: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::from_raw(cols as u32, rows as u32, raw)
        .ok_or_else(|| ExplainError::InvalidShape(format!("map of {}x{} cells", cols, rows)))?;

    let resized = imageops::resize(&grid, width, height, FilterType::Triangle);
    Array2::from_shape_vec((height as usize, width as usize), resized.into_raw())
        .map_err(|e| ExplainError::InvalidShape(e.to_string()))
}

/// Overlay `map` on `original` at the original's resolution.
///
/// The map is upsampled, inverted (`1 - v`), quantised to `0..=255`, coloured
/// with [`jet`] and blended as `0.6 * original + 0.4 * heatmap`.
pub fn composite(map: &ImportanceMap, original: &RgbImage) -> Result<RgbImage> {
    let (width, height) = original.dimensions();
    if width == 0 || height == 0 {
        return Err(ExplainError::InvalidShape("original image is empty".to_string()));
    }

    let upsampled = resize_map(map, width, height)?;

    let out = RgbImage::from_fn(width, height, |x, y| {
        let v = upsampled[[y as usize, x as usize]].clamp(0.0, 1.0);
        let level = (255.0 * (1.0 - v)) as u8;
        let heat = jet(level);
        let base = original.get_pixel(x, y);

        let mut pixel = [0u8; 3];
        for (c, out) in pixel.iter_mut().enumerate() {
            let blended = IMAGE_WEIGHT * base[c] as f32 + HEATMAP_WEIGHT * heat[c] as f32;
            *out = blended.round().clamp(0.0, 255.0) as u8;
        }
        Rgb(pixel)
    });

    Ok(out)
}
