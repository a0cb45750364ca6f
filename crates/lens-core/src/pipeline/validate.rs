//! Upload validation before any model runs.

use crate::config::LimitsConfig;
use crate::error::ValidationError;
use crate::types::ImageRequest;

/// Checks uploads against the configured size ceiling, content-type
/// allow-list, and image magic bytes. Pure: no decoding, no I/O.
#[derive(Debug, Clone)]
pub struct Validator {
    max_upload_bytes: u64,
    allowed: Vec<String>,
}

impl Validator {
    /// Create a new validator with the given limits.
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            max_upload_bytes: limits.max_upload_bytes,
            allowed: limits
                .allowed_content_types
                .iter()
                .map(|ct| normalize_content_type(ct))
                .collect(),
        }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Validate an upload and wrap it as an [`ImageRequest`].
    ///
    /// Checks, in order:
    /// - size is at most the configured maximum (exactly the limit passes)
    /// - payload is not empty
    /// - declared content type is allowed
    /// - bytes start with a known image signature whose type is also allowed
    pub fn validate(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<ImageRequest, ValidationError> {
        self.check_size(bytes.len() as u64)?;
        if bytes.is_empty() {
            return Err(ValidationError::EmptyPayload);
        }

        let declared = normalize_content_type(content_type);
        if !self.is_allowed(&declared) {
            return Err(ValidationError::UnsupportedMediaType {
                content_type: content_type.to_string(),
            });
        }

        match sniff_content_type(&bytes) {
            Some(actual) if self.is_allowed(actual) => Ok(ImageRequest::new(bytes, declared)),
            Some(actual) => Err(ValidationError::MalformedImage {
                reason: format!("content is {actual}, which is not accepted"),
            }),
            None => Err(ValidationError::MalformedImage {
                reason: "unrecognized image format (invalid magic bytes)".to_string(),
            }),
        }
    }

    /// Size check alone, usable before the body is fully buffered.
    pub fn check_size(&self, size: u64) -> Result<(), ValidationError> {
        if size > self.max_upload_bytes {
            return Err(ValidationError::PayloadTooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }
        Ok(())
    }

    fn is_allowed(&self, content_type: &str) -> bool {
        self.allowed.iter().any(|a| a == content_type)
    }
}

/// Lowercase, drop parameters, and fold common aliases.
pub fn normalize_content_type(value: &str) -> String {
    let base = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match base.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        "image/x-png" => "image/png".to_string(),
        _ => base,
    }
}

/// Map leading signature bytes to the MIME type they identify.
pub fn sniff_content_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }

    // JPEG: FF D8 FF
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }

    // PNG: 89 50 4E 47
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        return Some("image/png");
    }

    // GIF: GIF8
    if bytes.starts_with(b"GIF8") {
        return Some("image/gif");
    }

    // WebP: RIFF....WEBP
    if bytes.starts_with(b"RIFF") {
        return (bytes.len() >= 12 && &bytes[8..12] == b"WEBP").then_some("image/webp");
    }

    // BMP: BM
    if bytes.starts_with(b"BM") {
        return Some("image/bmp");
    }

    // TIFF: II*\0 or MM\0*
    if bytes.starts_with(&[b'I', b'I', 0x2A, 0x00]) || bytes.starts_with(&[b'M', b'M', 0x00, 0x2A])
    {
        return Some("image/tiff");
    }

    None
}
