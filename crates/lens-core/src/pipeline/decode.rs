//! Full image decode with dimension limits and timeout.

use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::InferenceError;
use crate::types::{Capability, ImageRequest};

/// Decode failure shared by every capability of one request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("{0}")]
    Invalid(String),

    #[error("{width}x{height} exceeds {max_dim}")]
    TooLarge { width: u32, height: u32, max_dim: u32 },

    #[error("decode timed out after {0}ms")]
    Timeout(u64),
}

impl DecodeError {
    /// Report this failure in one capability's slot.
    pub fn for_capability(&self, capability: Capability) -> InferenceError {
        match self {
            DecodeError::Invalid(message) => InferenceError::Decode {
                capability,
                message: message.clone(),
            },
            DecodeError::TooLarge {
                width,
                height,
                max_dim,
            } => InferenceError::ImageTooLarge {
                capability,
                width: *width,
                height: *height,
                max_dim: *max_dim,
            },
            DecodeError::Timeout(timeout_ms) => InferenceError::Timeout {
                capability,
                timeout_ms: *timeout_ms,
            },
        }
    }
}

/// A decoded image, shared read-only by all adapters of one request.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: Arc<DynamicImage>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Image decoder with configurable limits and timeout.
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    max_image_dimension: u32,
    decode_timeout_ms: u64,
}

impl ImageDecoder {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            max_image_dimension: limits.max_image_dimension,
            decode_timeout_ms: limits.decode_timeout_ms,
        }
    }

    /// Decode a validated upload off the async runtime.
    pub async fn decode(&self, request: &ImageRequest) -> Result<DecodedImage, DecodeError> {
        let bytes = request.bytes().to_vec();
        let timeout_duration = Duration::from_millis(self.decode_timeout_ms);

        let decoded = timeout(
            timeout_duration,
            tokio::task::spawn_blocking(move || decode_bytes_sync(bytes)),
        )
        .await
        .map_err(|_| DecodeError::Timeout(self.decode_timeout_ms))?
        .map_err(|e| DecodeError::Invalid(format!("task join error: {e}")))??;

        if decoded.width > self.max_image_dimension || decoded.height > self.max_image_dimension {
            return Err(DecodeError::TooLarge {
                width: decoded.width,
                height: decoded.height,
                max_dim: self.max_image_dimension,
            });
        }
        Ok(decoded)
    }
}

/// Synchronous decode (runs in spawn_blocking). Format comes from content, not
/// the declared type.
pub fn decode_bytes_sync(bytes: Vec<u8>) -> Result<DecodedImage, DecodeError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::Invalid(format!("cannot detect image format: {e}")))?;
    let format = reader
        .format()
        .ok_or_else(|| DecodeError::Invalid("unknown image format".to_string()))?;
    let image = reader
        .decode()
        .map_err(|e| DecodeError::Invalid(e.to_string()))?;

    let (width, height) = image.dimensions();
    Ok(DecodedImage {
        image: Arc::new(image),
        format,
        width,
        height,
    })
}

/// Width and height from the image header, without a full decode.
pub fn header_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Short lowercase name for an image format.
pub fn format_to_string(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Bmp => "bmp",
        _ => "unknown",
    }
}
