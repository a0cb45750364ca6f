//! Error types for the Lens analysis pipeline.
//!
//! Errors are organized by pipeline stage. Validation errors are caused by the
//! client and abort a request before any model runs. Inference errors belong to
//! a single capability and never abort its siblings. Enrichment errors are
//! absorbed into demo fallbacks by the clients themselves; only the variants a
//! client cannot fall back from (bad query, bad options) ever leave it.

use thiserror::Error;

use crate::types::Capability;

/// Top-level error type for Lens operations.
#[derive(Error, Debug)]
pub enum LensError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Upload rejected before any model ran
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A model adapter failed
    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    /// Enrichment failure the client could not absorb
    #[error("Enrichment error: {0}")]
    Enrichment(#[from] EnrichmentError),

    /// The whole request exceeded its deadline
    #[error("Request exceeded deadline of {timeout_ms}ms")]
    Deadline { timeout_ms: u64 },

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Upload validation failures (client-caused).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Upload exceeds the configured byte ceiling
    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },

    /// Declared content type is not in the allow-list
    #[error("Unsupported media type: {content_type}")]
    UnsupportedMediaType { content_type: String },

    /// Bytes do not carry a recognizable image header
    #[error("Malformed image: {reason}")]
    MalformedImage { reason: String },

    /// No bytes were uploaded
    #[error("Empty upload")]
    EmptyPayload,
}

/// Model adapter failures, always tagged with the capability that failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    /// The model for this capability is not loaded
    #[error("{capability} model unavailable: {reason}")]
    ModelUnavailable {
        capability: Capability,
        reason: String,
    },

    /// Full image decode failed
    #[error("Failed to decode image for {capability}: {message}")]
    Decode {
        capability: Capability,
        message: String,
    },

    /// Decoded image is larger than the configured dimension limit
    #[error("Image too large for {capability}: {width}x{height} > {max_dim}")]
    ImageTooLarge {
        capability: Capability,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// The underlying model call failed
    #[error("{capability} inference failed: {message}")]
    Failed {
        capability: Capability,
        message: String,
    },

    /// The model call did not finish within its timeout
    #[error("{capability} inference timed out after {timeout_ms}ms")]
    Timeout {
        capability: Capability,
        timeout_ms: u64,
    },
}

impl InferenceError {
    /// Shorthand for a generic model failure.
    pub fn failed(capability: Capability, message: impl Into<String>) -> Self {
        Self::Failed {
            capability,
            message: message.into(),
        }
    }

    /// The capability this error belongs to.
    pub fn capability(&self) -> Capability {
        match self {
            Self::ModelUnavailable { capability, .. }
            | Self::Decode { capability, .. }
            | Self::ImageTooLarge { capability, .. }
            | Self::Failed { capability, .. }
            | Self::Timeout { capability, .. } => *capability,
        }
    }

    /// Re-tag a shared error (e.g. a decode failure) for another capability.
    pub fn for_capability(&self, capability: Capability) -> Self {
        let mut err = self.clone();
        match &mut err {
            Self::ModelUnavailable { capability: c, .. }
            | Self::Decode { capability: c, .. }
            | Self::ImageTooLarge { capability: c, .. }
            | Self::Failed { capability: c, .. }
            | Self::Timeout { capability: c, .. } => *c = capability,
        }
        err
    }
}

/// External enrichment failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnrichmentError {
    /// Transport-level failure (DNS, connect, TLS)
    #[error("{provider} request failed: {message}")]
    Http { provider: String, message: String },

    /// Non-success HTTP status
    #[error("{provider} HTTP {status}: {message}")]
    Status {
        provider: String,
        status: u16,
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("Failed to parse {provider} response: {message}")]
    Parse { provider: String, message: String },

    /// The single attempt exceeded its timeout
    #[error("{provider} call timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    /// Query is unusable (e.g. empty after cleaning)
    #[error("Invalid enrichment query: {0}")]
    InvalidQuery(String),

    /// Options are out of range (unknown style, bad length)
    #[error("Invalid enrichment options: {0}")]
    InvalidOptions(String),
}

impl EnrichmentError {
    /// Whether this error is caused by the caller rather than the upstream service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidQuery(_) | Self::InvalidOptions(_))
    }
}

/// Convenience type alias for Lens results.
pub type Result<T> = std::result::Result<T, LensError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_error_retag() {
        let err = InferenceError::Decode {
            capability: Capability::Caption,
            message: "bad huffman table".to_string(),
        };
        let retagged = err.for_capability(Capability::Ocr);
        assert_eq!(retagged.capability(), Capability::Ocr);
        assert!(retagged.to_string().contains("ocr"));
        assert!(retagged.to_string().contains("bad huffman table"));
    }

    #[test]
    fn test_enrichment_client_errors() {
        assert!(EnrichmentError::InvalidQuery("empty".into()).is_client_error());
        assert!(EnrichmentError::InvalidOptions("style".into()).is_client_error());
        assert!(!EnrichmentError::Timeout {
            provider: "pixabay".into(),
            timeout_ms: 5000
        }
        .is_client_error());
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::PayloadTooLarge {
            size: 11,
            limit: 10,
        };
        assert!(err.to_string().contains("11 bytes"));
    }
}
