//! Environment variable overlay.
//!
//! Applied after the file is loaded, so deployment environments can tune the
//! server without a config file.

use crate::error::ConfigError;

use super::Config;

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{key}: invalid value '{value}'")))
}

impl Config {
    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary key lookup, then re-validate.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PORT") {
            self.server.port = parse("PORT", &v)?;
        }
        if let Some(v) = lookup("ALLOWED_ORIGINS") {
            self.server.allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("RATE_LIMIT_REQUESTS") {
            self.server.rate_limit_requests = parse("RATE_LIMIT_REQUESTS", &v)?;
        }
        if let Some(v) = lookup("RATE_LIMIT_WINDOW") {
            self.server.rate_limit_window_secs = parse("RATE_LIMIT_WINDOW", &v)?;
        }
        if let Some(v) = lookup("MAX_IMAGE_SIZE") {
            self.limits.max_upload_bytes = parse("MAX_IMAGE_SIZE", &v)?;
        }
        if let Some(v) = lookup("DEFAULT_SEARCH_COUNT") {
            self.search.default_count = parse("DEFAULT_SEARCH_COUNT", &v)?;
        }
        if let Some(v) = lookup("MAX_SEARCH_COUNT") {
            self.search.max_count = parse("MAX_SEARCH_COUNT", &v)?;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.logging.level = v.to_lowercase();
        }
        if let Some(v) = lookup("LENS_MODEL_DIR") {
            self.general.model_dir = v.into();
        }
        self.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overlay() {
        let mut config = Config::default();
        config
            .apply_env_with(lookup(&[
                ("PORT", "9100"),
                ("MAX_IMAGE_SIZE", "2048"),
                ("ALLOWED_ORIGINS", "http://a.test, http://b.test"),
                ("LOG_LEVEL", "DEBUG"),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.limits.max_upload_bytes, 2048);
        assert_eq!(
            config.server.allowed_origins,
            vec!["http://a.test", "http://b.test"]
        );
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_env_overlay_rejects_garbage() {
        let mut config = Config::default();
        let err = config
            .apply_env_with(lookup(&[("PORT", "eighty")]))
            .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_env_overlay_validates_result() {
        let mut config = Config::default();
        let err = config
            .apply_env_with(lookup(&[("MAX_SEARCH_COUNT", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("max_count"));
    }
}
