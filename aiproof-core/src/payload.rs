//! Image payloads sent to the service.
//!
//! Uploads are sniffed by magic bytes rather than file extension. The stamped
//! artifact is kept as PNG bytes and handed out as a fresh payload for every
//! attack so no iteration can consume another's upload.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::ImageFormat;

use crate::error::{Result, WatermarkError};

/// File name used for stamped uploads.
pub const STAMPED_FILE_NAME: &str = "stamped.png";

/// Upload formats accepted by the service.
pub const SUPPORTED_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// An image upload, validated on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    file_name: String,
    format: ImageFormat,
}

impl ImagePayload {
    /// Wrap raw bytes, rejecting anything that is not a PNG, JPEG, GIF or WebP
    /// image with a readable header.
    pub fn from_bytes(bytes: Vec<u8>, file_name: impl Into<String>) -> Result<Self> {
        let file_name = file_name.into();
        if bytes.is_empty() {
            return Err(WatermarkError::InvalidInput(format!(
                "{file_name} is empty"
            )));
        }

        let invalid =
            || WatermarkError::InvalidInput(format!("{file_name} is not a valid image file"));

        let format = image::guess_format(&bytes).map_err(|_| invalid())?;
        if !SUPPORTED_FORMATS.contains(&format) {
            return Err(WatermarkError::InvalidInput(format!(
                "{file_name} is {}, expected PNG, JPEG, GIF or WebP",
                format.to_mime_type()
            )));
        }

        // Magic bytes alone are not enough; the header must parse too.
        image::ImageReader::with_format(Cursor::new(&bytes), format)
            .into_dimensions()
            .map_err(|_| invalid())?;

        Ok(Self {
            bytes,
            file_name,
            format,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The watermarked image returned by the stamp call, always held as PNG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampedImage {
    png: Vec<u8>,
}

impl StampedImage {
    /// Decode the service's base64 body (a `data:` prefix is tolerated).
    ///
    /// Non-PNG images are re-encoded so attack uploads are always PNG.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let encoded = encoded
            .split_once(";base64,")
            .map_or(encoded, |(_, data)| data)
            .trim();

        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| WatermarkError::DecodeError(format!("Invalid base64 image: {e}")))?;

        Self::from_image_bytes(bytes)
    }

    /// Accept image bytes in any supported format.
    pub fn from_image_bytes(bytes: Vec<u8>) -> Result<Self> {
        match image::guess_format(&bytes) {
            Ok(ImageFormat::Png) => Ok(Self { png: bytes }),
            Ok(format) => {
                tracing::debug!(?format, "Re-encoding stamped image as PNG");
                let decoded = image::load_from_memory_with_format(&bytes, format)?;
                let mut png = Cursor::new(Vec::new());
                decoded.write_to(&mut png, ImageFormat::Png)?;
                Ok(Self {
                    png: png.into_inner(),
                })
            }
            Err(_) => Err(WatermarkError::DecodeError(
                "Stamped image is not a recognised image format".into(),
            )),
        }
    }

    pub fn as_png(&self) -> &[u8] {
        &self.png
    }

    /// A fresh upload of the stamped artifact.
    pub fn to_upload(&self) -> ImagePayload {
        ImagePayload {
            bytes: self.png.clone(),
            file_name: STAMPED_FILE_NAME.to_string(),
            format: ImageFormat::Png,
        }
    }
}

/// Decode an optional base64 PNG field such as the detect heatmap.
pub fn decode_optional_png(encoded: Option<&str>) -> Result<Option<Vec<u8>>> {
    match encoded {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => StampedImage::from_base64(s).map(|img| Some(img.png)),
    }
}

#[cfg(test)]
pub(crate) mod test_images {
    use image::{ImageBuffer, Rgb};

    use super::*;

    /// A small encoded test image in the requested format.
    pub fn encoded(format: ImageFormat) -> Vec<u8> {
        let img = ImageBuffer::from_fn(16, 16, |x, y| {
            Rgb([(x * 16) as u8, (y * 16) as u8, ((x + y) * 8) as u8])
        });
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }
}
