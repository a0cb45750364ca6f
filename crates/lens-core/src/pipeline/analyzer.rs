//! Pipeline orchestration: validate, decode, infer, enrich, assemble.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::{Config, VisualConfig};
use crate::enrich::{SearchClient, SummaryClient, SummaryStyle};
use crate::error::{LensError, Result, ValidationError};
use crate::models::{InferenceParams, ModelRegistry};
use crate::types::{
    AnalysisResponse, Capability, CapabilityOutcome, EnrichmentKind, EnrichmentResult,
    EnrichmentSource, ImageRequest, InferenceResult,
};

use super::assemble::assemble;
use super::cache::ResponseCache;
use super::decode::ImageDecoder;
use super::hash::content_hash;
use super::validate::Validator;

/// What one analysis request runs.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeOptions {
    /// Adapters to run, in response order
    pub capabilities: Vec<Capability>,
    pub enrichment: EnrichmentKind,
    /// Detection confidence override
    pub detection_threshold: Option<f32>,
    pub search_count: Option<usize>,
    pub summary_style: SummaryStyle,
    pub summary_max_length: Option<usize>,
}

impl AnalyzeOptions {
    /// Defaults for composite analysis.
    pub fn from_visual(visual: &VisualConfig) -> Self {
        Self {
            capabilities: visual.default_capabilities.clone(),
            enrichment: visual.default_enrichment,
            ..Self::default()
        }
    }

    /// Run a single capability with no enrichment.
    pub fn only(capability: Capability) -> Self {
        Self {
            capabilities: vec![capability],
            ..Self::default()
        }
    }

    fn params(&self) -> InferenceParams {
        InferenceParams {
            confidence_threshold: self.detection_threshold,
        }
    }

    /// Stable text form used in cache keys.
    fn fingerprint(&self) -> String {
        let capabilities: Vec<&str> = self.capabilities.iter().map(Capability::as_str).collect();
        format!(
            "{}|{:?}|{:?}|{:?}|{}|{:?}",
            capabilities.join(","),
            self.enrichment,
            self.detection_threshold,
            self.search_count,
            self.summary_style,
            self.summary_max_length
        )
    }
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            capabilities: Capability::ALL.to_vec(),
            enrichment: EnrichmentKind::None,
            detection_threshold: None,
            search_count: None,
            summary_style: SummaryStyle::default(),
            summary_max_length: None,
        }
    }
}

/// Runs the analysis pipeline for one upload at a time.
///
/// Holds only read-only state (loaded models, immutable clients) plus the
/// optional response cache, so one instance serves all requests.
pub struct Analyzer {
    validator: Validator,
    decoder: ImageDecoder,
    models: Arc<ModelRegistry>,
    search: SearchClient,
    summary: SummaryClient,
    cache: Option<ResponseCache>,
    request_timeout_ms: u64,
    defaults: AnalyzeOptions,
}

impl Analyzer {
    /// Build with enrichment clients chosen from config credentials.
    pub fn new(config: &Config, models: Arc<ModelRegistry>) -> Self {
        Self::with_clients(
            config,
            models,
            SearchClient::from_config(&config.search),
            SummaryClient::from_config(&config.summary),
        )
    }

    pub fn with_clients(
        config: &Config,
        models: Arc<ModelRegistry>,
        search: SearchClient,
        summary: SummaryClient,
    ) -> Self {
        Self {
            validator: Validator::new(&config.limits),
            decoder: ImageDecoder::new(&config.limits),
            models,
            search,
            summary,
            cache: ResponseCache::from_config(&config.cache),
            request_timeout_ms: config.limits.request_timeout_ms,
            defaults: AnalyzeOptions::from_visual(&config.visual),
        }
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn search(&self) -> &SearchClient {
        &self.search
    }

    pub fn summary(&self) -> &SummaryClient {
        &self.summary
    }

    /// Options used when a composite request doesn't choose.
    pub fn default_options(&self) -> AnalyzeOptions {
        self.defaults.clone()
    }

    /// Run the full pipeline on one upload.
    ///
    /// Validation failures abort before any model runs. Adapter failures land
    /// in their own slot. Enrichment that cannot run becomes a warning.
    pub async fn analyze(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        options: &AnalyzeOptions,
    ) -> Result<AnalysisResponse> {
        self.analyze_with_id(Uuid::new_v4(), bytes, content_type, options)
            .await
    }

    /// [`analyze`](Self::analyze) under a caller-chosen request id.
    pub async fn analyze_with_id(
        &self,
        request_id: Uuid,
        bytes: Vec<u8>,
        content_type: &str,
        options: &AnalyzeOptions,
    ) -> Result<AnalysisResponse> {
        let start = Instant::now();
        let request = self.validator.validate(bytes, content_type)?;

        let cache_key = self
            .cache
            .as_ref()
            .map(|_| format!("{}:{}", content_hash(request.bytes()), options.fingerprint()));
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(hit) = cache.get(key) {
                tracing::debug!(%request_id, "Served analysis from cache");
                return Ok(hit.replayed(request_id, start.elapsed().as_millis() as u64));
            }
        }

        let (outcomes, enrichment, warnings) = self
            .with_deadline(self.run(&request, options))
            .await?;
        let response = assemble(outcomes, enrichment, warnings, request_id, start.elapsed());

        tracing::debug!(
            %request_id,
            capabilities = response.results.len(),
            elapsed_ms = response.elapsed_ms,
            "Analysis complete"
        );

        if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
            if self.is_cacheable(&response) {
                cache.insert(key, response.clone());
            }
        }
        Ok(response)
    }

    /// Only complete answers are cached: every slot ok, no warnings, and no
    /// demo payload standing in for a live client that failed this time.
    fn is_cacheable(&self, response: &AnalysisResponse) -> bool {
        let fallback = response.enrichment.as_ref().is_some_and(|e| {
            e.is_demo
                && match e.source {
                    EnrichmentSource::Search => !self.search.is_demo(),
                    EnrichmentSource::Summary => !self.summary.is_demo(),
                }
        });
        response.warnings.is_empty()
            && response.results.iter().all(|s| s.error.is_none())
            && !fallback
    }

    /// Validate, decode and run a single adapter.
    pub async fn infer_one(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        capability: Capability,
        params: InferenceParams,
    ) -> Result<InferenceResult> {
        let request = self.validator.validate(bytes, content_type)?;
        self.with_deadline(async {
            let decoded = self
                .decoder
                .decode(&request)
                .await
                .map_err(|e| e.for_capability(capability))?;
            Ok::<_, LensError>(self.models.infer(capability, decoded.image, params).await?)
        })
        .await
    }

    /// Validate without running anything.
    pub fn validate(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> std::result::Result<ImageRequest, ValidationError> {
        self.validator.validate(bytes, content_type)
    }

    async fn with_deadline<T, F>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        match timeout(Duration::from_millis(self.request_timeout_ms), fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Request exceeded deadline of {}ms", self.request_timeout_ms);
                Err(LensError::Deadline {
                    timeout_ms: self.request_timeout_ms,
                })
            }
        }
    }

    async fn run(
        &self,
        request: &ImageRequest,
        options: &AnalyzeOptions,
    ) -> Result<(Vec<CapabilityOutcome>, Option<EnrichmentResult>, Vec<String>)> {
        let decode_start = Instant::now();
        let outcomes = match self.decoder.decode(request).await {
            Ok(decoded) => {
                tracing::debug!(
                    "Decoded {}x{} in {:?}",
                    decoded.width,
                    decoded.height,
                    decode_start.elapsed()
                );
                let params = options.params();
                let calls = options.capabilities.iter().map(|&capability| {
                    let image = Arc::clone(&decoded.image);
                    async move {
                        CapabilityOutcome {
                            capability,
                            result: self.models.infer(capability, image, params).await,
                        }
                    }
                });
                join_all(calls).await
            }
            Err(e) => {
                tracing::warn!("Decode failed, failing all capabilities: {e}");
                options
                    .capabilities
                    .iter()
                    .map(|&capability| CapabilityOutcome {
                        capability,
                        result: Err(e.for_capability(capability)),
                    })
                    .collect()
            }
        };

        let mut warnings = Vec::new();
        let enrichment = self.enrich(&outcomes, options, &mut warnings).await;
        Ok((outcomes, enrichment, warnings))
    }

    /// Enrichment keyed on the caption. Never fails the request.
    async fn enrich(
        &self,
        outcomes: &[CapabilityOutcome],
        options: &AnalyzeOptions,
        warnings: &mut Vec<String>,
    ) -> Option<EnrichmentResult> {
        let kind = match options.enrichment {
            EnrichmentKind::None => return None,
            EnrichmentKind::Search => "search",
            EnrichmentKind::Summary => "summary",
        };

        let caption = match outcomes.iter().find(|o| o.capability == Capability::Caption) {
            None => {
                warnings.push(format!(
                    "{kind} enrichment skipped: caption was not requested"
                ));
                return None;
            }
            Some(CapabilityOutcome { result: Err(_), .. }) => {
                warnings.push(format!("{kind} enrichment skipped: caption failed"));
                return None;
            }
            Some(CapabilityOutcome { result: Ok(result), .. }) => result.caption()?,
        };

        let result = match options.enrichment {
            EnrichmentKind::Search => self.search.enrich(caption, options.search_count).await,
            EnrichmentKind::Summary => {
                self.summary
                    .enrich(caption, options.summary_style, options.summary_max_length)
                    .await
            }
            EnrichmentKind::None => return None,
        };

        match result {
            Ok(enrichment) => Some(enrichment),
            Err(e) => {
                tracing::warn!("{kind} enrichment skipped: {e}");
                warnings.push(format!("{kind} enrichment skipped: {e}"));
                None
            }
        }
    }
}
