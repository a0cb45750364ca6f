//! Image-search enrichment client with demo fallback.

use std::sync::Arc;
use std::time::Duration;

use super::pixabay::PixabayProvider;
use super::provider::{resolve_env_var, SearchProvider};
use crate::config::SearchConfig;
use crate::error::EnrichmentError;
use crate::types::{EnrichmentContent, EnrichmentResult, EnrichmentSource, SearchItem};

/// Leading phrases captioning models like to emit.
const CAPTION_PREFIXES: &[&str] = &["a photo of", "an image of"];

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

const DEMO_COLORS: &[&str] = &["0066cc", "cc6600", "009966", "cc0066", "6600cc"];

/// Live or demo, fixed when the client is built.
pub enum SearchStrategy {
    Live(Arc<dyn SearchProvider>),
    Demo,
}

/// Enrichment client for image search.
pub struct SearchClient {
    strategy: SearchStrategy,
    timeout: Duration,
    default_count: usize,
    max_count: usize,
}

impl SearchClient {
    /// Build from config. An unresolved or empty API key selects demo mode.
    pub fn from_config(config: &SearchConfig) -> Self {
        let endpoint = config.endpoint.clone();
        Self::select(resolve_env_var(&config.api_key), config, move |key| {
            Arc::new(PixabayProvider::new(&key, &endpoint)) as Arc<dyn SearchProvider>
        })
    }

    /// Pick the strategy by credential presence. `build` only runs for live mode.
    pub fn select<F>(credential: Option<String>, config: &SearchConfig, build: F) -> Self
    where
        F: FnOnce(String) -> Arc<dyn SearchProvider>,
    {
        match credential {
            Some(key) => Self::with_provider(build(key), config),
            None => {
                tracing::warn!("No search API key configured, image search runs in demo mode");
                Self::demo(config)
            }
        }
    }

    pub fn demo(config: &SearchConfig) -> Self {
        Self::new(SearchStrategy::Demo, config)
    }

    pub fn with_provider(provider: Arc<dyn SearchProvider>, config: &SearchConfig) -> Self {
        Self::new(SearchStrategy::Live(provider), config)
    }

    fn new(strategy: SearchStrategy, config: &SearchConfig) -> Self {
        Self {
            strategy,
            timeout: Duration::from_millis(config.timeout_ms),
            default_count: config.default_count,
            max_count: config.max_count,
        }
    }

    pub fn is_demo(&self) -> bool {
        matches!(self.strategy, SearchStrategy::Demo)
    }

    /// Provider name, or "demo".
    pub fn mode(&self) -> &str {
        match &self.strategy {
            SearchStrategy::Live(provider) => provider.name(),
            SearchStrategy::Demo => "demo",
        }
    }

    /// Requested count, defaulted and clamped to `1..=max_count`.
    pub fn clamp_count(&self, count: Option<usize>) -> usize {
        count
            .unwrap_or(self.default_count)
            .clamp(1, self.max_count.max(1))
    }

    /// Search for images related to a caption or free-text description.
    ///
    /// Fails only when the description leaves no usable query.
    pub async fn enrich(
        &self,
        description: &str,
        count: Option<usize>,
    ) -> Result<EnrichmentResult, EnrichmentError> {
        let query = build_query(description);
        if query.is_empty() {
            return Err(EnrichmentError::InvalidQuery(format!(
                "no search terms left in '{}'",
                description.trim()
            )));
        }
        Ok(self.search_query(&query, count).await)
    }

    /// Run an already-built query. Upstream failures fall back to demo items.
    pub async fn search_query(&self, query: &str, count: Option<usize>) -> EnrichmentResult {
        let count = self.clamp_count(count);
        let provider = match &self.strategy {
            SearchStrategy::Live(provider) => provider,
            SearchStrategy::Demo => return demo_result(query, count),
        };

        let timeout_ms = self.timeout.as_millis() as u64;
        let outcome = match tokio::time::timeout(self.timeout, provider.search(query, count)).await
        {
            Ok(result) => result,
            Err(_) => Err(EnrichmentError::Timeout {
                provider: provider.name().to_string(),
                timeout_ms,
            }),
        };

        match outcome {
            Ok(items) => EnrichmentResult {
                source: EnrichmentSource::Search,
                query: query.to_string(),
                content: EnrichmentContent::Items(items),
                is_demo: false,
            },
            Err(e) => {
                tracing::warn!("Image search failed, using demo results: {e}");
                demo_result(query, count)
            }
        }
    }
}

fn demo_result(query: &str, count: usize) -> EnrichmentResult {
    EnrichmentResult {
        source: EnrichmentSource::Search,
        query: query.to_string(),
        content: EnrichmentContent::Items(demo_items(query, count)),
        is_demo: true,
    }
}

/// Turn a caption into search terms.
pub fn build_query(description: &str) -> String {
    let mut text = description.trim().to_lowercase();
    for prefix in CAPTION_PREFIXES {
        text = text.replace(prefix, " ");
    }
    text.split_whitespace()
        .filter(|word| !STOP_WORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deterministic placeholder items for `query`.
pub fn demo_items(query: &str, count: usize) -> Vec<SearchItem> {
    let words: Vec<&str> = query.split_whitespace().collect();
    let slug = words.join("+");
    let mut tags: Vec<String> = words.iter().map(|w| w.to_string()).collect();
    tags.push("demo".to_string());
    tags.push("placeholder".to_string());

    (0..count)
        .map(|i| {
            let color = DEMO_COLORS[i % DEMO_COLORS.len()];
            let n = i + 1;
            SearchItem {
                title: format!("Demo image about {query} #{n}"),
                url: format!("https://via.placeholder.com/800x600/{color}/ffffff?text={slug}+{n}"),
                thumbnail: format!(
                    "https://via.placeholder.com/150x150/{color}/ffffff?text={slug}+{n}"
                ),
                source: "demo.placeholder.com".to_string(),
                width: 800,
                height: 600,
                tags: tags.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct MockSearch {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl SearchProvider for MockSearch {
        fn name(&self) -> &str {
            "mock"
        }

        async fn search(
            &self,
            query: &str,
            count: usize,
        ) -> Result<Vec<SearchItem>, EnrichmentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(demo_items(query, count)
                .into_iter()
                .map(|mut item| {
                    item.source = "mock".to_string();
                    item
                })
                .collect())
        }
    }

    fn config(timeout_ms: u64) -> SearchConfig {
        SearchConfig {
            timeout_ms,
            ..SearchConfig::default()
        }
    }

    /// Serve `app` on an ephemeral port and return its base URL.
    async fn spawn_upstream(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api/")
    }

    fn pixabay_client(endpoint: &str, timeout_ms: u64) -> SearchClient {
        let provider = Arc::new(PixabayProvider::new("test-key", endpoint));
        SearchClient::with_provider(provider, &config(timeout_ms))
    }

    #[test]
    fn test_build_query_strips_prefix_and_stop_words() {
        assert_eq!(
            build_query("A photo of a dog playing with a ball in the park"),
            "dog playing ball park"
        );
        assert_eq!(build_query("an image of the city at night"), "city night");
        assert_eq!(build_query("  Red Shoes  "), "red shoes");
        assert_eq!(build_query("of the and"), "");
    }

    #[test]
    fn test_demo_items_cycle_colors() {
        let items = demo_items("red shoes", 7);
        assert_eq!(items.len(), 7);
        assert_eq!(
            items[0].url,
            "https://via.placeholder.com/800x600/0066cc/ffffff?text=red+shoes+1"
        );
        assert!(items[4].url.contains("/6600cc/"));
        assert!(items[5].url.contains("/0066cc/"));
        assert_eq!(items[6].title, "Demo image about red shoes #7");
        assert!(items[0].thumbnail.contains("150x150"));
        assert_eq!(items[0].tags, vec!["red", "shoes", "demo", "placeholder"]);
        assert_eq!(items, demo_items("red shoes", 7));
    }

    #[test]
    fn test_clamp_count() {
        let client = SearchClient::demo(&SearchConfig::default());
        assert_eq!(client.clamp_count(None), 10);
        assert_eq!(client.clamp_count(Some(0)), 1);
        assert_eq!(client.clamp_count(Some(500)), 50);
    }

    #[tokio::test]
    async fn test_no_credential_never_touches_network() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut built = false;
        let client = SearchClient::select(None, &SearchConfig::default(), |_| {
            built = true;
            Arc::new(MockSearch {
                calls: calls.clone(),
            })
        });
        assert!(!built);
        assert!(client.is_demo());
        assert_eq!(client.mode(), "demo");

        for _ in 0..3 {
            let result = client.enrich("a dog on a beach", Some(4)).await.unwrap();
            assert!(result.is_demo);
            assert_eq!(result.query, "dog beach");
            assert_eq!(result.items().len(), 4);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_credential_selects_live_provider() {
        let calls = Arc::new(AtomicU32::new(0));
        let provider_calls = calls.clone();
        let client = SearchClient::select(Some("key".into()), &SearchConfig::default(), move |_| {
            Arc::new(MockSearch {
                calls: provider_calls,
            })
        });
        assert!(!client.is_demo());

        let result = client.enrich("a red bicycle", None).await.unwrap();
        assert!(!result.is_demo);
        assert_eq!(result.items().len(), 10);
        assert_eq!(result.items()[0].source, "mock");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_query_is_client_error() {
        let client = SearchClient::demo(&SearchConfig::default());
        let err = client.enrich("a photo of the", None).await.unwrap_err();
        assert!(matches!(err, EnrichmentError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_live_pixabay_round_trip() {
        let app = Router::new().route(
            "/api/",
            get(|| async {
                Json(serde_json::json!({
                    "total": 1,
                    "totalHits": 1,
                    "hits": [{
                        "id": 42,
                        "tags": "bicycle, red",
                        "previewURL": "https://cdn.test/p.jpg",
                        "webformatURL": "https://cdn.test/w.jpg",
                        "largeImageURL": "https://cdn.test/l.jpg",
                        "imageWidth": 1280,
                        "imageHeight": 960
                    }]
                }))
            }),
        );
        let endpoint = spawn_upstream(app).await;
        let client = pixabay_client(&endpoint, 2000);

        let result = client.enrich("a red bicycle", Some(5)).await.unwrap();
        assert!(!result.is_demo);
        assert_eq!(result.items().len(), 1);
        assert_eq!(result.items()[0].url, "https://cdn.test/l.jpg");
        assert_eq!(result.items()[0].source, "pixabay.com/photos/42");
    }

    #[tokio::test]
    async fn test_upstream_error_status_falls_back_to_demo() {
        let app = Router::new().route(
            "/api/",
            get(|| async { (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded") }),
        );
        let endpoint = spawn_upstream(app).await;
        let client = pixabay_client(&endpoint, 2000);

        let result = client.enrich("a red bicycle", Some(3)).await.unwrap();
        assert!(result.is_demo);
        assert_eq!(result.items(), demo_items("red bicycle", 3).as_slice());
    }

    #[tokio::test]
    async fn test_upstream_timeout_falls_back_to_demo() {
        let app = Router::new().route(
            "/api/",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(serde_json::json!({ "hits": [] }))
            }),
        );
        let endpoint = spawn_upstream(app).await;
        let client = pixabay_client(&endpoint, 100);

        let start = std::time::Instant::now();
        let result = client.enrich("mountain lake", Some(2)).await.unwrap();
        assert!(result.is_demo);
        assert_eq!(result.items().len(), 2);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_falls_back_to_demo() {
        let client = pixabay_client("http://127.0.0.1:1/api/", 1000);
        let result = client.search_query("beach", Some(1)).await;
        assert!(result.is_demo);
    }
}
