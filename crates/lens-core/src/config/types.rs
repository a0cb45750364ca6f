//! Sub-configuration structs and their defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::types::{Capability, EnrichmentKind};

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where ONNX models are stored
    pub model_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("~/.lens/models"),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// CORS origins; `"*"` allows any
    pub allowed_origins: Vec<String>,

    /// Requests allowed per client IP per window (0 disables limiting)
    pub rate_limit_requests: u32,

    /// Rate-limit window length in seconds
    pub rate_limit_window_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            allowed_origins: vec!["*".to_string()],
            rate_limit_requests: 100,
            rate_limit_window_secs: 60,
        }
    }
}

/// Upload and execution limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum accepted upload size in bytes (inclusive)
    pub max_upload_bytes: u64,

    /// Content types accepted by the validator
    pub allowed_content_types: Vec<String>,

    /// Maximum decoded width or height
    pub max_image_dimension: u32,

    /// Full decode timeout in milliseconds
    pub decode_timeout_ms: u64,

    /// Per-adapter inference timeout in milliseconds
    pub inference_timeout_ms: u64,

    /// Overall deadline for one analysis in milliseconds
    pub request_timeout_ms: u64,

    /// Files accepted by `/batch/analyze-multiple`
    pub max_batch_files: usize,

    /// Files accepted by `/batch/search-multiple`
    pub max_search_batch_files: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            allowed_content_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
                "image/gif".to_string(),
            ],
            max_image_dimension: 10000,
            decode_timeout_ms: 5000,
            inference_timeout_ms: 30000,
            request_timeout_ms: 60000,
            max_batch_files: 10,
            max_search_batch_files: 5,
        }
    }
}

/// Caption model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    pub enabled: bool,

    /// Model directory name under `general.model_dir`
    pub model: String,

    /// Square input size of the vision encoder
    pub image_size: u32,

    /// Maximum generated tokens
    pub max_tokens: usize,

    /// Base URL model files are downloaded from (`{source_url}/{file}`).
    /// Empty means files are installed by hand.
    pub source_url: String,

    /// Expected BLAKE3 digests keyed by file name
    pub checksums: BTreeMap<String, String>,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "blip-caption-base".to_string(),
            image_size: 384,
            max_tokens: 30,
            source_url: String::new(),
            checksums: BTreeMap::new(),
        }
    }
}

/// Object detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub enabled: bool,
    pub model: String,

    /// Letterbox input size
    pub input_size: u32,

    /// Detections below this confidence are dropped
    pub confidence_threshold: f32,

    /// Overlap above which a lower-scoring box of the same class is suppressed
    pub iou_threshold: f32,

    pub max_detections: usize,

    /// Base URL model files are downloaded from (`{source_url}/{file}`).
    /// Empty means files are installed by hand.
    pub source_url: String,

    /// Expected BLAKE3 digests keyed by file name
    pub checksums: BTreeMap<String, String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "yolov8n".to_string(),
            input_size: 640,
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            max_detections: 100,
            source_url: String::new(),
            checksums: BTreeMap::new(),
        }
    }
}

/// Text recognition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub enabled: bool,
    pub model: String,

    /// Recogniser input height
    pub line_height: u32,

    /// Lines with a lower mean character confidence are dropped
    pub min_confidence: f32,

    /// Base URL model files are downloaded from (`{source_url}/{file}`).
    /// Empty means files are installed by hand.
    pub source_url: String,

    /// Expected BLAKE3 digests keyed by file name
    pub checksums: BTreeMap<String, String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "ctc-rec".to_string(),
            line_height: 48,
            min_confidence: 0.5,
            source_url: String::new(),
            checksums: BTreeMap::new(),
        }
    }
}

/// Composite analysis defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    /// Capabilities run when a request doesn't choose
    pub default_capabilities: Vec<Capability>,

    /// Enrichment run when a request doesn't choose
    pub default_enrichment: EnrichmentKind,

    /// Detection threshold used by `/visual/quick-scan`
    pub quick_scan_threshold: f32,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            default_capabilities: Capability::ALL.to_vec(),
            default_enrichment: EnrichmentKind::Search,
            quick_scan_threshold: 0.7,
        }
    }
}

/// Pixabay image search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub endpoint: String,

    /// API key (supports ${ENV_VAR} syntax); unset means demo mode
    pub api_key: String,

    pub timeout_ms: u64,
    pub default_count: usize,
    pub max_count: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://pixabay.com/api/".to_string(),
            api_key: "${PIXABAY_API_KEY}".to_string(),
            timeout_ms: 5000,
            default_count: 10,
            max_count: 50,
        }
    }
}

/// Gemini summary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub endpoint: String,

    /// API key (supports ${ENV_VAR} syntax); unset means demo mode
    pub api_key: String,

    pub model: String,
    pub timeout_ms: u64,

    /// Default maximum summary length in characters
    pub max_length: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: "${GEMINI_API_KEY}".to_string(),
            model: "gemini-1.5-flash".to_string(),
            timeout_ms: 10000,
            max_length: 150,
        }
    }
}

/// Composite response cache. Off by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_secs: 300,
            max_entries: 256,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
