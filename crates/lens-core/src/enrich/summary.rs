//! Caption-summary enrichment client with demo fallback.

use std::sync::Arc;
use std::time::Duration;

use super::gemini::GeminiProvider;
use super::provider::{resolve_env_var, SummaryProvider, SummaryRequest, SummaryStyle};
use crate::config::SummaryConfig;
use crate::error::EnrichmentError;
use crate::types::{EnrichmentContent, EnrichmentResult, EnrichmentSource};

/// Accepted `max_length` range, in characters.
pub const MAX_LENGTH_LIMIT: usize = 2000;

/// Live or demo, fixed when the client is built.
pub enum SummaryStrategy {
    Live(Arc<dyn SummaryProvider>),
    Demo,
}

/// Enrichment client for caption summaries.
pub struct SummaryClient {
    strategy: SummaryStrategy,
    timeout: Duration,
    default_max_length: usize,
}

impl SummaryClient {
    /// Build from config. An unresolved or empty API key selects demo mode.
    pub fn from_config(config: &SummaryConfig) -> Self {
        let endpoint = config.endpoint.clone();
        let model = config.model.clone();
        Self::select(resolve_env_var(&config.api_key), config, move |key| {
            Arc::new(GeminiProvider::new(&key, &model, &endpoint)) as Arc<dyn SummaryProvider>
        })
    }

    /// Pick the strategy by credential presence. `build` only runs for live mode.
    pub fn select<F>(credential: Option<String>, config: &SummaryConfig, build: F) -> Self
    where
        F: FnOnce(String) -> Arc<dyn SummaryProvider>,
    {
        match credential {
            Some(key) => Self::with_provider(build(key), config),
            None => {
                tracing::warn!("No summary API key configured, summaries run in demo mode");
                Self::demo(config)
            }
        }
    }

    pub fn demo(config: &SummaryConfig) -> Self {
        Self::new(SummaryStrategy::Demo, config)
    }

    pub fn with_provider(provider: Arc<dyn SummaryProvider>, config: &SummaryConfig) -> Self {
        Self::new(SummaryStrategy::Live(provider), config)
    }

    fn new(strategy: SummaryStrategy, config: &SummaryConfig) -> Self {
        Self {
            strategy,
            timeout: Duration::from_millis(config.timeout_ms),
            default_max_length: config.max_length,
        }
    }

    pub fn is_demo(&self) -> bool {
        matches!(self.strategy, SummaryStrategy::Demo)
    }

    /// Provider name, or "demo".
    pub fn mode(&self) -> &str {
        match &self.strategy {
            SummaryStrategy::Live(provider) => provider.name(),
            SummaryStrategy::Demo => "demo",
        }
    }

    /// Summarize a caption in the given style.
    ///
    /// Fails only for an empty caption or an out-of-range `max_length`;
    /// upstream failures fall back to the demo template.
    pub async fn enrich(
        &self,
        caption: &str,
        style: SummaryStyle,
        max_length: Option<usize>,
    ) -> Result<EnrichmentResult, EnrichmentError> {
        let caption = caption.trim();
        if caption.is_empty() {
            return Err(EnrichmentError::InvalidQuery("caption is empty".to_string()));
        }
        let max_length = max_length.unwrap_or(self.default_max_length);
        if !(1..=MAX_LENGTH_LIMIT).contains(&max_length) {
            return Err(EnrichmentError::InvalidOptions(format!(
                "max_length must be between 1 and {MAX_LENGTH_LIMIT}, got {max_length}"
            )));
        }

        let request = SummaryRequest {
            caption: caption.to_string(),
            style,
            max_length,
        };
        let (text, is_demo) = match &self.strategy {
            SummaryStrategy::Demo => (demo_summary(caption, style), true),
            SummaryStrategy::Live(provider) => match self.call(provider.as_ref(), &request).await {
                Ok(text) => (text, false),
                Err(e) => {
                    tracing::warn!("Summary generation failed, using demo summary: {e}");
                    (demo_summary(caption, style), true)
                }
            },
        };

        Ok(EnrichmentResult {
            source: EnrichmentSource::Summary,
            query: caption.to_string(),
            content: EnrichmentContent::Text(truncate_on_word(&text, max_length)),
            is_demo,
        })
    }

    async fn call(
        &self,
        provider: &dyn SummaryProvider,
        request: &SummaryRequest,
    ) -> Result<String, EnrichmentError> {
        match tokio::time::timeout(self.timeout, provider.summarize(request)).await {
            Ok(result) => result,
            Err(_) => Err(EnrichmentError::Timeout {
                provider: provider.name().to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

/// Deterministic placeholder summary for a caption.
pub fn demo_summary(caption: &str, style: SummaryStyle) -> String {
    let caption = caption.trim().trim_end_matches('.');
    match style {
        SummaryStyle::Descriptive => format!(
            "This image shows {caption}. The main subject is clearly visible, \
             with the surroundings giving context to the scene."
        ),
        SummaryStyle::Technical => format!(
            "Technical overview: the frame contains {caption}. Subject placement, \
             lighting and background are typical of a standard photograph."
        ),
        SummaryStyle::Creative => format!(
            "A moment worth remembering: {caption}, caught in a scene full of \
             quiet detail and character."
        ),
        SummaryStyle::Concise => capitalize(caption),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Cut `text` to at most `max` characters, preferring a word boundary.
pub fn truncate_on_word(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    let next_is_space = text.chars().nth(max).is_some_and(char::is_whitespace);
    if next_is_space {
        return cut.trim_end().to_string();
    }
    match cut.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => cut[..idx].trim_end().to_string(),
        _ => cut,
    }
}
