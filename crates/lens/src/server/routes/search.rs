//! Caption-driven image search.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use lens_core::types::SearchItem;
use lens_core::{Capability, InferenceParams, SearchClient};

use super::GroupHealth;
use crate::server::error::ApiError;
use crate::server::state::AppState;
use crate::server::upload::Upload;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/image", post(search_image))
        .route("/by-image", post(search_image))
        .route("/health", get(health))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    /// Caption the query was built from
    pub description: String,
    pub query: String,
    pub results: Vec<SearchItem>,
    pub is_demo: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Search with a caption. An unusable query yields no results and a warning.
pub async fn search_by_caption(
    client: &SearchClient,
    caption: String,
    count: Option<usize>,
) -> SearchResponse {
    match client.enrich(&caption, count).await {
        Ok(result) => SearchResponse {
            query: result.query.clone(),
            results: result.items().to_vec(),
            is_demo: result.is_demo,
            description: caption,
            warnings: Vec::new(),
        },
        Err(e) => SearchResponse {
            query: String::new(),
            results: Vec::new(),
            is_demo: client.is_demo(),
            description: caption,
            warnings: vec![format!("search skipped: {e}")],
        },
    }
}

/// Caption the upload, then search for similar images.
async fn search_image(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
    upload: Upload,
) -> Result<Json<SearchResponse>, ApiError> {
    let Query(query) = query?;
    let result = state
        .analyzer
        .infer_one(
            upload.bytes,
            &upload.content_type,
            Capability::Caption,
            InferenceParams::default(),
        )
        .await?;
    let caption = result.caption().unwrap_or_default().to_string();
    Ok(Json(
        search_by_caption(state.analyzer.search(), caption, query.count).await,
    ))
}

async fn health(State(state): State<AppState>) -> Json<GroupHealth> {
    let search = state.analyzer.search();
    Json(GroupHealth {
        status: "ok",
        service: "search",
        detail: json!({ "mode": search.mode(), "demo": search.is_demo() }),
    })
}
