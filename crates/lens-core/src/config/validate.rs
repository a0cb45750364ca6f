//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

fn invalid(msg: &str) -> ConfigError {
    ConfigError::ValidationError(msg.to_string())
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;
        if limits.max_upload_bytes == 0 {
            return Err(invalid("limits.max_upload_bytes must be > 0"));
        }
        if limits.allowed_content_types.is_empty() {
            return Err(invalid("limits.allowed_content_types must not be empty"));
        }
        if limits.max_image_dimension == 0 {
            return Err(invalid("limits.max_image_dimension must be > 0"));
        }
        if limits.decode_timeout_ms == 0
            || limits.inference_timeout_ms == 0
            || limits.request_timeout_ms == 0
        {
            return Err(invalid("limits timeouts must be > 0"));
        }
        if limits.max_batch_files == 0 || limits.max_search_batch_files == 0 {
            return Err(invalid("limits batch file counts must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.detection.confidence_threshold) {
            return Err(invalid(
                "detection.confidence_threshold must be between 0.0 and 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.detection.iou_threshold) {
            return Err(invalid("detection.iou_threshold must be between 0.0 and 1.0"));
        }
        if self.detection.input_size == 0 || self.detection.input_size % 32 != 0 {
            return Err(invalid("detection.input_size must be a positive multiple of 32"));
        }
        if !(0.0..=1.0).contains(&self.ocr.min_confidence) {
            return Err(invalid("ocr.min_confidence must be between 0.0 and 1.0"));
        }
        if self.ocr.line_height == 0 {
            return Err(invalid("ocr.line_height must be > 0"));
        }
        if self.caption.image_size == 0 || self.caption.max_tokens == 0 {
            return Err(invalid("caption.image_size and caption.max_tokens must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.visual.quick_scan_threshold) {
            return Err(invalid(
                "visual.quick_scan_threshold must be between 0.0 and 1.0",
            ));
        }
        if self.search.max_count == 0 {
            return Err(invalid("search.max_count must be > 0"));
        }
        if self.search.default_count == 0 || self.search.default_count > self.search.max_count {
            return Err(invalid("search.default_count must be in 1..=search.max_count"));
        }
        if self.search.timeout_ms == 0 || self.summary.timeout_ms == 0 {
            return Err(invalid("enrichment timeouts must be > 0"));
        }
        if !(1..=2000).contains(&self.summary.max_length) {
            return Err(invalid("summary.max_length must be between 1 and 2000"));
        }
        if self.cache.enabled && (self.cache.ttl_secs == 0 || self.cache.max_entries == 0) {
            return Err(invalid("cache.ttl_secs and cache.max_entries must be > 0"));
        }
        if self.server.rate_limit_requests > 0 && self.server.rate_limit_window_secs == 0 {
            return Err(invalid("server.rate_limit_window_secs must be > 0"));
        }
        Ok(())
    }
}
