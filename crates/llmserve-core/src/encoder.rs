//! Image to data-URI encoding for vision prompts.
//!
//! Output is always PNG. PNG input is validated and passed through byte for
//! byte; any other decodable raster format is re-encoded to PNG.

use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::ImageFormat;
use thiserror::Error;

use crate::domain::ContentBlock;

const DATA_URI_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Image is empty")]
    Empty,

    #[error("Unrecognized image data: {0}")]
    Decode(String),

    #[error("Failed to serialize image as PNG: {0}")]
    Serialize(String),
}

/// Stateless encoder from image bytes to `data:image/png;base64,...`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultimodalEncoder;

impl MultimodalEncoder {
    /// Encode image bytes as a PNG data URI.
    pub fn encode(image: &[u8]) -> Result<String, EncodeError> {
        let png = Self::to_png(image)?;
        Ok(format!("{DATA_URI_PREFIX}{}", STANDARD.encode(png)))
    }

    /// Encode image bytes as an image content block.
    pub fn image_block(image: &[u8]) -> Result<ContentBlock, EncodeError> {
        Self::encode(image).map(ContentBlock::image)
    }

    fn to_png(image: &[u8]) -> Result<Vec<u8>, EncodeError> {
        if image.is_empty() {
            return Err(EncodeError::Empty);
        }

        let format = image::guess_format(image).map_err(|e| EncodeError::Decode(e.to_string()))?;
        if format == ImageFormat::Png {
            // Decode anyway so truncated or corrupt PNGs are rejected here
            image::load_from_memory_with_format(image, ImageFormat::Png)
                .map_err(|e| EncodeError::Decode(e.to_string()))?;
            return Ok(image.to_vec());
        }

        let decoded = image::load_from_memory_with_format(image, format)
            .map_err(|e| EncodeError::Decode(e.to_string()))?;
        let mut out = Cursor::new(Vec::new());
        decoded
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|e| EncodeError::Serialize(e.to_string()))?;
        Ok(out.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};

    fn png_bytes() -> Vec<u8> {
        let img = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn jpeg_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(4, 4, Rgb([0, 128, 255]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Jpeg)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_png_is_passed_through_verbatim() {
        let png = png_bytes();
        let uri = MultimodalEncoder::encode(&png).unwrap();

        assert_eq!(uri, format!("data:image/png;base64,{}", STANDARD.encode(&png)));

        let payload = uri.strip_prefix(DATA_URI_PREFIX).unwrap();
        assert_eq!(STANDARD.decode(payload).unwrap(), png);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let jpeg = jpeg_bytes();
        assert_eq!(
            MultimodalEncoder::encode(&jpeg).unwrap(),
            MultimodalEncoder::encode(&jpeg).unwrap()
        );
    }

    #[test]
    fn test_jpeg_is_reencoded_as_png() {
        let uri = MultimodalEncoder::encode(&jpeg_bytes()).unwrap();
        let payload = uri.strip_prefix(DATA_URI_PREFIX).unwrap();
        let bytes = STANDARD.decode(payload).unwrap();

        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            MultimodalEncoder::encode(b"definitely not an image"),
            Err(EncodeError::Decode(_))
        ));
        assert!(matches!(
            MultimodalEncoder::encode(&[]),
            Err(EncodeError::Empty)
        ));
    }

    #[test]
    fn test_truncated_png_is_rejected() {
        let png = png_bytes();
        assert!(MultimodalEncoder::encode(&png[..png.len() / 2]).is_err());
    }

    #[test]
    fn test_image_block_wraps_uri() {
        let block = MultimodalEncoder::image_block(&png_bytes()).unwrap();
        assert!(matches!(
            block,
            ContentBlock::ImageRef { ref data_uri } if data_uri.starts_with(DATA_URI_PREFIX)
        ));
    }
}
