//! Enrichment provider traits and request types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EnrichmentError;
use crate::types::SearchItem;

/// A live image-search backend.
///
/// Uses `async_trait` so clients can hold `Arc<dyn SearchProvider>`.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name for logging (e.g., "pixabay").
    fn name(&self) -> &str;

    /// One search call. Returns at most `count` items.
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchItem>, EnrichmentError>;
}

/// A live text-summary backend.
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    fn name(&self) -> &str;

    /// One generation call. Length limits are applied by the caller.
    async fn summarize(&self, request: &SummaryRequest) -> Result<String, EnrichmentError>;
}

/// Tone of a generated summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStyle {
    #[default]
    Descriptive,
    Technical,
    Creative,
    Concise,
}

impl SummaryStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStyle::Descriptive => "descriptive",
            SummaryStyle::Technical => "technical",
            SummaryStyle::Creative => "creative",
            SummaryStyle::Concise => "concise",
        }
    }

    /// Style used for a content context (`fashion`, `technology`, ...).
    pub fn for_context(context: &str) -> Self {
        match context.to_ascii_lowercase().as_str() {
            "fashion" => SummaryStyle::Creative,
            "technology" => SummaryStyle::Technical,
            _ => SummaryStyle::Descriptive,
        }
    }

    /// Prompt instruction for live providers.
    pub fn instruction(&self) -> &'static str {
        match self {
            SummaryStyle::Descriptive => {
                "Write a clear, descriptive summary of the image described by this caption."
            }
            SummaryStyle::Technical => {
                "Write a precise, technical summary of the image described by this caption, \
                 covering subjects, composition and setting."
            }
            SummaryStyle::Creative => {
                "Write an engaging, creative summary of the image described by this caption."
            }
            SummaryStyle::Concise => {
                "Rewrite this image caption as one short, search-friendly phrase."
            }
        }
    }
}

impl fmt::Display for SummaryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryStyle {
    type Err = EnrichmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "descriptive" => Ok(SummaryStyle::Descriptive),
            "technical" => Ok(SummaryStyle::Technical),
            "creative" => Ok(SummaryStyle::Creative),
            "concise" => Ok(SummaryStyle::Concise),
            other => Err(EnrichmentError::InvalidOptions(format!(
                "unknown style '{other}' (expected descriptive, technical, creative or concise)"
            ))),
        }
    }
}

/// A request to summarize a caption.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRequest {
    pub caption: String,
    pub style: SummaryStyle,
    /// Maximum summary length in characters
    pub max_length: usize,
}

impl SummaryRequest {
    /// Prompt text sent to live providers.
    pub fn prompt(&self) -> String {
        format!(
            "{} Caption: \"{}\". Answer in at most {} characters, without preamble.",
            self.style.instruction(),
            self.caption,
            self.max_length
        )
    }
}

/// Resolve `${ENV_VAR}` references in config strings.
///
/// Returns `None` for an empty value or an unset variable, which selects demo mode.
pub fn resolve_env_var(value: &str) -> Option<String> {
    resolve_with(value, |name| std::env::var(name).ok())
}

pub(crate) fn resolve_with<F>(value: &str, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let resolved = match value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        Some(name) => lookup(name)?,
        None => value.to_string(),
    };
    let trimmed = resolved.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
