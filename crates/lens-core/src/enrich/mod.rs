//! Enrichment clients: image search and caption summaries.
//!
//! Each client is a two-variant strategy (live provider or demo) chosen once
//! at construction from credential presence. A live client makes exactly one
//! bounded call per request and falls back to the demo payload on any
//! upstream failure.

pub mod gemini;
pub mod pixabay;
pub mod provider;
pub mod search;
pub mod summary;

pub use gemini::GeminiProvider;
pub use pixabay::PixabayProvider;
pub use provider::{resolve_env_var, SearchProvider, SummaryProvider, SummaryRequest, SummaryStyle};
pub use search::{build_query, demo_items, SearchClient, SearchStrategy};
pub use summary::{demo_summary, truncate_on_word, SummaryClient, SummaryStrategy};
