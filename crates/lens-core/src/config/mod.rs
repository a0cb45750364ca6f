//! Configuration management for Lens.
//!
//! Configuration is loaded from `config.toml` in the platform config dir, then
//! overlaid with a small set of environment variables. A missing file means
//! defaults.

mod env;
mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Lens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Upload and execution limits
    pub limits: LimitsConfig,

    /// Caption model settings
    pub caption: CaptionConfig,

    /// Object detection settings
    pub detection: DetectionConfig,

    /// Text recognition settings
    pub ocr: OcrConfig,

    /// Composite analysis defaults
    pub visual: VisualConfig,

    /// Image search enrichment
    pub search: SearchConfig,

    /// LLM summary enrichment
    pub summary: SummaryConfig,

    /// Response cache
    pub cache: CacheConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.lens.lens/config.toml
    /// - Linux: ~/.config/lens/config.toml
    ///
    /// Falls back to ~/.lens/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "lens", "lens")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".lens").join("config.toml")
            })
    }

    /// Get the resolved model directory path (with ~ expansion).
    pub fn model_dir(&self) -> PathBuf {
        let path_str = self.general.model_dir.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Capability, EnrichmentKind};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.limits.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.detection.confidence_threshold, 0.5);
        assert!(!config.cache.enabled);
        assert_eq!(config.visual.default_enrichment, EnrichmentKind::Search);
        assert_eq!(config.visual.default_capabilities, Capability::ALL.to_vec());
    }

    #[test]
    fn test_config_to_toml() {
        let toml = Config::default().to_toml().unwrap();
        assert!(toml.contains("[limits]"));
        assert!(toml.contains("[visual]"));
        assert!(toml.contains("api_key = \"${PIXABAY_API_KEY}\""));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            concat!(
                "[visual]\n",
                "default_capabilities = [\"caption\", \"ocr\"]\n",
                "default_enrichment = \"none\"\n",
            ),
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(
            config.visual.default_capabilities,
            vec![Capability::Caption, Capability::Ocr]
        );
        assert_eq!(config.visual.default_enrichment, EnrichmentKind::None);
        assert_eq!(config.limits.max_batch_files, 10);
    }

    #[test]
    fn test_load_from_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[limits]\nmax_upload_bytes = 0\n").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("max_upload_bytes"));
    }
}
