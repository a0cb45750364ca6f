//! Lens Core - embeddable image analysis pipeline.
//!
//! Lens takes one uploaded image, runs pretrained models over it (caption,
//! object detection, OCR), optionally enriches the caption through an
//! external search or summary API, and returns one structured response.
//!
//! # Architecture
//!
//! ```text
//! Upload → Validate → Decode → Adapters (parallel) → Enrichment → Assemble → JSON
//! ```
//!
//! Models load once into a [`ModelRegistry`] before any request is served.
//! Enrichment clients are built in live or demo mode from credential presence.
//!
//! # Usage
//!
//! ```rust,ignore
//! use lens_core::{AnalyzeOptions, Analyzer, Config, ModelRegistry};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> lens_core::Result<()> {
//!     let config = Config::load()?;
//!     let models = Arc::new(ModelRegistry::load(&config));
//!     let analyzer = Analyzer::new(&config, models);
//!
//!     let bytes = std::fs::read("photo.jpg")?;
//!     let options = analyzer.default_options();
//!     let response = analyzer.analyze(bytes, "image/jpeg", &options).await?;
//!     println!("{:?}", response.caption());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod enrich;
pub mod error;
pub mod insight;
pub mod models;
pub mod pipeline;
pub mod types;

pub use config::Config;
pub use enrich::{SearchClient, SummaryClient, SummaryStyle};
pub use error::{
    ConfigError, EnrichmentError, InferenceError, LensError, Result, ValidationError,
};
pub use models::{InferenceParams, ModelAdapter, ModelRegistry, ModelStatus};
pub use pipeline::{AnalyzeOptions, Analyzer};
pub use types::{
    AnalysisResponse, Capability, EnrichmentKind, EnrichmentResult, InferenceResult,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
