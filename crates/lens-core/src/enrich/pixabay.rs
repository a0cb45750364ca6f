//! Pixabay image search provider.

use async_trait::async_trait;
use serde::Deserialize;

use super::provider::SearchProvider;
use crate::error::EnrichmentError;
use crate::types::SearchItem;

const PROVIDER: &str = "pixabay";

/// Pixabay accepts 3..=200 results per page.
pub const MIN_PER_PAGE: usize = 3;
pub const MAX_PER_PAGE: usize = 200;

/// Pixabay search API client.
pub struct PixabayProvider {
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl PixabayProvider {
    pub fn new(api_key: &str, endpoint: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            endpoint: endpoint.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Query parameters for one search.
    fn params(&self, query: &str, count: usize) -> Vec<(&'static str, String)> {
        vec![
            ("key", self.api_key.clone()),
            ("q", query.to_string()),
            ("image_type", "photo".to_string()),
            ("orientation", "all".to_string()),
            ("category", "all".to_string()),
            ("min_width", "640".to_string()),
            ("min_height", "480".to_string()),
            (
                "per_page",
                count.clamp(MIN_PER_PAGE, MAX_PER_PAGE).to_string(),
            ),
            ("safesearch", "true".to_string()),
            ("order", "popular".to_string()),
        ]
    }
}

// --- Response types ---

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Hit {
    id: u64,
    #[serde(default)]
    tags: String,
    #[serde(default, rename = "previewURL")]
    preview_url: String,
    #[serde(default, rename = "webformatURL")]
    webformat_url: String,
    #[serde(default, rename = "largeImageURL")]
    large_image_url: String,
    #[serde(default)]
    image_width: u32,
    #[serde(default)]
    image_height: u32,
}

impl Hit {
    fn into_item(self, query: &str) -> SearchItem {
        let url = if self.large_image_url.is_empty() {
            self.webformat_url
        } else {
            self.large_image_url
        };
        let title = if self.tags.is_empty() {
            format!("Image about {query}")
        } else {
            self.tags.clone()
        };
        SearchItem {
            title,
            url,
            thumbnail: self.preview_url,
            source: format!("pixabay.com/photos/{}", self.id),
            width: self.image_width,
            height: self.image_height,
            tags: self
                .tags
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
        }
    }
}

/// Map a Pixabay response body to search items.
fn parse_items(body: &str, query: &str, count: usize) -> Result<Vec<SearchItem>, EnrichmentError> {
    let resp: SearchResponse = serde_json::from_str(body).map_err(|e| EnrichmentError::Parse {
        provider: PROVIDER.to_string(),
        message: e.to_string(),
    })?;
    Ok(resp
        .hits
        .into_iter()
        .take(count)
        .map(|hit| hit.into_item(query))
        .collect())
}

#[async_trait]
impl SearchProvider for PixabayProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchItem>, EnrichmentError> {
        tracing::info!("Searching Pixabay for '{query}'");
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&self.params(query, count))
            .send()
            .await
            .map_err(|e| EnrichmentError::Http {
                provider: PROVIDER.to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(EnrichmentError::Status {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                message: text,
            });
        }

        let body = resp.text().await.map_err(|e| EnrichmentError::Http {
            provider: PROVIDER.to_string(),
            message: e.to_string(),
        })?;
        let items = parse_items(&body, query, count)?;
        tracing::debug!("Pixabay returned {} items", items.len());
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_clamp_per_page() {
        let provider = PixabayProvider::new("k", "http://localhost/api/");
        let per_page = |count| {
            provider
                .params("dog", count)
                .into_iter()
                .find(|(k, _)| *k == "per_page")
                .map(|(_, v)| v)
                .unwrap()
        };
        assert_eq!(per_page(1), "3");
        assert_eq!(per_page(10), "10");
        assert_eq!(per_page(500), "200");

        let params = provider.params("dog", 10);
        assert!(params.contains(&("safesearch", "true".to_string())));
        assert!(params.contains(&("order", "popular".to_string())));
        assert!(params.contains(&("min_width", "640".to_string())));
    }

    #[test]
    fn test_parse_items_maps_fields() {
        let body = r#"{
            "total": 2, "totalHits": 2,
            "hits": [
                {"id": 7, "tags": "dog, puppy, pet", "previewURL": "p7", "webformatURL": "w7",
                 "largeImageURL": "l7", "imageWidth": 1920, "imageHeight": 1280},
                {"id": 8, "tags": "", "previewURL": "p8", "webformatURL": "w8",
                 "imageWidth": 640, "imageHeight": 480}
            ]
        }"#;
        let items = parse_items(body, "dog", 10).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "dog, puppy, pet");
        assert_eq!(items[0].url, "l7");
        assert_eq!(items[0].thumbnail, "p7");
        assert_eq!(items[0].source, "pixabay.com/photos/7");
        assert_eq!(items[0].tags, vec!["dog", "puppy", "pet"]);
        assert_eq!(items[1].url, "w8");
        assert_eq!(items[1].title, "Image about dog");
    }

    #[test]
    fn test_parse_items_truncates_and_rejects_garbage() {
        let body = r#"{"hits": [{"id": 1}, {"id": 2}, {"id": 3}, {"id": 4}]}"#;
        assert_eq!(parse_items(body, "q", 2).unwrap().len(), 2);
        assert!(matches!(
            parse_items("<html>", "q", 2),
            Err(EnrichmentError::Parse { .. })
        ));
    }
}
