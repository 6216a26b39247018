//! Transport encoding: lossless PNG wrapped in standard base-64 text.

use std::io::Cursor;

use base64::{prelude::BASE64_STANDARD, Engine};
use image::{ImageFormat, RgbImage};

use cxr_core::{CoreError, Result};

/// Encode an RGB image as PNG bytes.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| CoreError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

/// Encode an RGB image as base-64 PNG text.
pub fn encode_image(image: &RgbImage) -> Result<String> {
    Ok(BASE64_STANDARD.encode(encode_png(image)?))
}

/// Decode base-64 PNG text produced by [`encode_image`].
pub fn decode_image(text: &str) -> Result<RgbImage> {
    let bytes = BASE64_STANDARD
        .decode(text.trim())
        .map_err(|e| CoreError::Decode(format!("invalid base64: {}", e)))?;
    let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png)?;
    Ok(decoded.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_roundtrip_is_pixel_exact() {
        let mut image = RgbImage::new(17, 9);
        for (x, y, p) in image.enumerate_pixels_mut() {
            *p = Rgb([(x * 15) as u8, (y * 28) as u8, ((x + y) * 7) as u8]);
        }

        let text = encode_image(&image).unwrap();
        assert!(text.is_ascii());
        let decoded = decode_image(&text).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_encoded_payload_is_png() {
        let png = encode_png(&RgbImage::new(1, 1)).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_image("@@@"), Err(CoreError::Decode(_))));
        let not_png = BASE64_STANDARD.encode(b"hello");
        assert!(decode_image(&not_png).is_err());
    }
}
