//! Composite visual analysis: every capability plus optional enrichment.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use lens_core::insight::{self, SearchType};
use lens_core::types::SearchItem;
use lens_core::{AnalysisResponse, AnalyzeOptions, Capability, InferenceParams};

use super::{AnalyzeQuery, GroupHealth};
use crate::server::error::ApiError;
use crate::server::state::AppState;
use crate::server::upload::{ImageInfo, Upload};

/// Results per smart search when the caller doesn't say.
const SMART_SEARCH_COUNT: usize = 8;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/quick-scan", post(quick_scan))
        .route("/smart-search", post(smart_search))
        .route("/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct VisualResponse {
    #[serde(flatten)]
    pub analysis: AnalysisResponse,
    pub categories: Vec<String>,
    pub image: ImageInfo,
}

#[derive(Debug, Default, Deserialize)]
pub struct SmartSearchQuery {
    pub count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SmartSearchResponse {
    pub detected_type: SearchType,
    pub description: String,
    pub contextual_query: String,
    pub results: Vec<SearchItem>,
    pub is_demo: bool,
}

pub(crate) async fn run_analysis(
    state: &AppState,
    upload: Upload,
    options: &AnalyzeOptions,
) -> Result<VisualResponse, ApiError> {
    let request_id = Uuid::new_v4();
    let image = upload.info();
    let analysis = state
        .analyzer
        .analyze_with_id(request_id, upload.bytes, &upload.content_type, options)
        .await
        .map_err(|e| ApiError::from(e).with_request_id(request_id))?;
    let categories = analysis
        .caption()
        .map(insight::categorize)
        .unwrap_or_else(|| vec!["general".to_string()]);
    Ok(VisualResponse {
        analysis,
        categories,
        image,
    })
}

async fn analyze(
    State(state): State<AppState>,
    query: Result<Query<AnalyzeQuery>, QueryRejection>,
    upload: Upload,
) -> Result<Json<VisualResponse>, ApiError> {
    let Query(query) = query?;
    let options = query.options(state.analyzer.default_options())?;
    Ok(Json(run_analysis(&state, upload, &options).await?))
}

/// All capabilities at a lower detection threshold, no enrichment.
async fn quick_scan(
    State(state): State<AppState>,
    upload: Upload,
) -> Result<Json<VisualResponse>, ApiError> {
    let options = AnalyzeOptions {
        detection_threshold: Some(state.config.visual.quick_scan_threshold),
        ..AnalyzeOptions::default()
    };
    Ok(Json(run_analysis(&state, upload, &options).await?))
}

/// Caption the upload, classify it, and search with a query tuned to the class.
async fn smart_search(
    State(state): State<AppState>,
    query: Result<Query<SmartSearchQuery>, QueryRejection>,
    upload: Upload,
) -> Result<Json<SmartSearchResponse>, ApiError> {
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
    let description = result.caption().unwrap_or_default().trim().to_string();
    let detected_type = insight::search_type(&description);
    let contextual_query = insight::contextual_query(&description);

    let (results, is_demo) = if contextual_query.is_empty() {
        (Vec::new(), state.analyzer.search().is_demo())
    } else {
        let found = state
            .analyzer
            .search()
            .search_query(
                &contextual_query,
                Some(query.count.unwrap_or(SMART_SEARCH_COUNT)),
            )
            .await;
        (found.items().to_vec(), found.is_demo)
    };

    Ok(Json(SmartSearchResponse {
        detected_type,
        description,
        contextual_query,
        results,
        is_demo,
    }))
}

async fn health(State(state): State<AppState>) -> Json<GroupHealth> {
    let models = state.analyzer.models();
    let ready = Capability::ALL.iter().all(|&c| models.is_ready(c));
    let defaults = state.analyzer.default_options();
    Json(GroupHealth {
        status: if ready { "ok" } else { "degraded" },
        service: "visual",
        detail: json!({
            "default_capabilities": defaults.capabilities,
            "default_enrichment": defaults.enrichment,
            "quick_scan_threshold": state.config.visual.quick_scan_threshold,
        }),
    })
}
