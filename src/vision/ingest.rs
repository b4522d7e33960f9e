// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image ingestion: raw upload bytes to a canonical RGB image

use bytes::Bytes;
use image::{ImageFormat, RgbImage};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Default maximum image size (10MB)
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// MIME types accepted at the upload boundary
pub const ACCEPTED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png"];

/// Fatal ingestion errors. No report is produced when one of these occurs.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    #[error("Image data is empty")]
    EmptyData,

    #[error("Image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),
}

/// Upload payload as received from the caller.
///
/// Consumed by [`ImageIngestor::ingest`]; the byte buffer does not outlive decoding.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub bytes: Bytes,
    pub declared_mime_type: String,
}

impl RawImage {
    pub fn new(bytes: impl Into<Bytes>, declared_mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            declared_mime_type: declared_mime_type.into(),
        }
    }
}

/// Decoded 8-bit RGB image with a top-left origin.
///
/// Cloning is cheap: the pixel buffer is shared and never mutated.
#[derive(Debug, Clone)]
pub struct CanonicalImage {
    pixels: Arc<RgbImage>,
}

impl CanonicalImage {
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    pub fn from_shared(pixels: Arc<RgbImage>) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn channels(&self) -> u8 {
        3
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn shared_pixels(&self) -> Arc<RgbImage> {
        Arc::clone(&self.pixels)
    }
}

/// Validates and decodes uploads
#[derive(Debug, Clone)]
pub struct ImageIngestor {
    max_image_bytes: usize,
}

impl Default for ImageIngestor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IMAGE_BYTES)
    }
}

impl ImageIngestor {
    pub fn new(max_image_bytes: usize) -> Self {
        Self { max_image_bytes }
    }

    pub fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    /// Decode an upload into a [`CanonicalImage`]
    ///
    /// # Returns
    /// * `Err(IngestError::UnsupportedFormat)` - declared MIME type is not JPEG or PNG,
    ///   or the body is neither
    /// * `Err(IngestError::DecodeError)` - the body cannot be decoded
    pub fn ingest(&self, raw: RawImage) -> Result<CanonicalImage, IngestError> {
        let RawImage {
            bytes,
            declared_mime_type,
        } = raw;

        let declared = declared_format(&declared_mime_type)?;

        if bytes.is_empty() {
            return Err(IngestError::EmptyData);
        }
        if bytes.len() > self.max_image_bytes {
            return Err(IngestError::TooLarge(bytes.len(), self.max_image_bytes));
        }

        let format = match detect_format(&bytes) {
            Some(sniffed) => {
                if sniffed != declared {
                    warn!(
                        declared = %declared_mime_type,
                        sniffed = ?sniffed,
                        "Declared MIME type does not match image contents, decoding as sniffed format"
                    );
                }
                sniffed
            }
            None => {
                return Err(IngestError::DecodeError(format!(
                    "body is not a valid {:?} image",
                    declared
                )))
            }
        };

        let decoded = image::load_from_memory_with_format(&bytes, format)
            .map_err(|e| IngestError::DecodeError(e.to_string()))?;
        let rgb = decoded.to_rgb8();

        debug!(
            width = rgb.width(),
            height = rgb.height(),
            size_bytes = bytes.len(),
            "Ingested image"
        );

        Ok(CanonicalImage::from_rgb(rgb))
    }
}

/// Lowercase the MIME type and strip parameters such as `; charset=...`
pub fn normalize_mime_type(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn declared_format(mime: &str) -> Result<ImageFormat, IngestError> {
    match normalize_mime_type(mime).as_str() {
        "image/jpeg" => Ok(ImageFormat::Jpeg),
        "image/png" => Ok(ImageFormat::Png),
        _ => Err(IngestError::UnsupportedFormat(mime.to_string())),
    }
}

/// Detect the container format from magic bytes
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    match bytes {
        // PNG: 89 50 4E 47 (0x89 P N G)
        [0x89, 0x50, 0x4E, 0x47, ..] => Some(ImageFormat::Png),

        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some(ImageFormat::Jpeg),

        _ => None,
    }
}
