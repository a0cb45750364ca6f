//! Route handlers, one module per surface.

pub mod analyze;
pub mod batch;
pub mod health;
pub mod llm;
pub mod search;
pub mod visual;

use serde::{Deserialize, Serialize};

use lens_core::{AnalyzeOptions, Capability, EnrichmentKind, SummaryStyle};

use super::error::ApiError;

/// Query options shared by the composite endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeQuery {
    /// Comma-separated capability list, e.g. `caption,ocr`
    pub capabilities: Option<String>,
    /// `search`, `summary` or `none`
    pub enrichment: Option<String>,
    /// Detection confidence threshold
    pub confidence: Option<f32>,
    /// Number of search results
    pub count: Option<usize>,
    /// Summary style
    pub style: Option<String>,
    /// Summary length in characters
    pub max_length: Option<usize>,
}

impl AnalyzeQuery {
    /// Overlay this query on the configured defaults.
    pub fn options(&self, defaults: AnalyzeOptions) -> Result<AnalyzeOptions, ApiError> {
        let mut options = defaults;
        if let Some(list) = &self.capabilities {
            options.capabilities = Capability::parse_list(list).map_err(ApiError::bad_request)?;
        }
        if let Some(kind) = &self.enrichment {
            options.enrichment = kind
                .parse::<EnrichmentKind>()
                .map_err(ApiError::bad_request)?;
        }
        if let Some(style) = &self.style {
            options.summary_style = style.parse::<SummaryStyle>()?;
        }
        options.detection_threshold = check_confidence(self.confidence)?;
        options.search_count = self.count;
        options.summary_max_length = self.max_length;
        Ok(options)
    }
}

/// Thresholds must lie in `[0, 1]`.
pub fn check_confidence(value: Option<f32>) -> Result<Option<f32>, ApiError> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(ApiError::bad_request(format!(
            "confidence must be between 0 and 1, got {v}"
        ))),
        other => Ok(other),
    }
}

/// Body of every `/{group}/health` route.
#[derive(Debug, Serialize)]
pub struct GroupHealth {
    pub status: &'static str,
    pub service: &'static str,
    #[serde(flatten)]
    pub detail: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_overlays_defaults() {
        let query = AnalyzeQuery {
            capabilities: Some("ocr,caption".into()),
            enrichment: Some("summary".into()),
            style: Some("concise".into()),
            confidence: Some(0.8),
            ..Default::default()
        };
        let options = query.options(AnalyzeOptions::default()).unwrap();
        assert_eq!(options.capabilities, vec![Capability::Ocr, Capability::Caption]);
        assert_eq!(options.enrichment, EnrichmentKind::Summary);
        assert_eq!(options.summary_style, SummaryStyle::Concise);
        assert_eq!(options.detection_threshold, Some(0.8));
    }

    #[test]
    fn test_query_rejects_bad_values() {
        let bad = [
            AnalyzeQuery {
                capabilities: Some("faces".into()),
                ..Default::default()
            },
            AnalyzeQuery {
                enrichment: Some("translate".into()),
                ..Default::default()
            },
            AnalyzeQuery {
                style: Some("poetic".into()),
                ..Default::default()
            },
            AnalyzeQuery {
                confidence: Some(1.5),
                ..Default::default()
            },
        ];
        for query in bad {
            let err = query.options(AnalyzeOptions::default()).unwrap_err();
            assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        }
    }
}
