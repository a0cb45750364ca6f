//! Caption summaries.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use lens_core::enrich::SummaryStyle;

use super::GroupHealth;
use crate::server::error::ApiError;
use crate::server::state::AppState;

/// Default length for `/llm/enhance-caption`.
const ENHANCED_CAPTION_LENGTH: usize = 50;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/summary", post(summary))
        .route("/enhance-caption", post(enhance_caption))
        .route("/contextual-summary", post(contextual_summary))
        .route("/health", get(health))
}

#[derive(Debug, Deserialize)]
pub struct SummaryBody {
    pub caption: String,
    pub style: Option<String>,
    pub max_length: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
    pub style: SummaryStyle,
    pub is_demo: bool,
}

async fn summary(
    State(state): State<AppState>,
    body: Result<Json<SummaryBody>, JsonRejection>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let Json(body) = body?;
    let style = match &body.style {
        Some(style) => style.parse::<SummaryStyle>()?,
        None => SummaryStyle::default(),
    };
    let result = state
        .analyzer
        .summary()
        .enrich(&body.caption, style, body.max_length)
        .await?;
    Ok(Json(SummaryResponse {
        summary: result.text().unwrap_or_default().to_string(),
        style,
        is_demo: result.is_demo,
    }))
}

#[derive(Debug, Deserialize)]
pub struct EnhanceQuery {
    pub caption: String,
    pub max_length: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct EnhanceResponse {
    pub original_caption: String,
    pub enhanced_caption: String,
    pub is_demo: bool,
}

/// Short, search-friendly rewrite of a caption.
async fn enhance_caption(
    State(state): State<AppState>,
    query: Result<Query<EnhanceQuery>, QueryRejection>,
) -> Result<Json<EnhanceResponse>, ApiError> {
    let Query(query) = query?;
    let result = state
        .analyzer
        .summary()
        .enrich(
            &query.caption,
            SummaryStyle::Concise,
            Some(query.max_length.unwrap_or(ENHANCED_CAPTION_LENGTH)),
        )
        .await?;
    Ok(Json(EnhanceResponse {
        enhanced_caption: result.text().unwrap_or_default().to_string(),
        original_caption: query.caption,
        is_demo: result.is_demo,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ContextQuery {
    pub caption: String,
    pub context_type: Option<String>,
    pub max_length: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ContextResponse {
    pub summary: String,
    pub context_type: String,
    pub style: SummaryStyle,
    pub is_demo: bool,
}

const CONTEXT_TYPES: &[&str] = &["fashion", "food", "nature", "technology", "general"];

async fn contextual_summary(
    State(state): State<AppState>,
    query: Result<Query<ContextQuery>, QueryRejection>,
) -> Result<Json<ContextResponse>, ApiError> {
    let Query(query) = query?;
    let context_type = query
        .context_type
        .as_deref()
        .unwrap_or("general")
        .to_ascii_lowercase();
    if !CONTEXT_TYPES.contains(&context_type.as_str()) {
        return Err(ApiError::bad_request(format!(
            "context_type must be one of {}, got '{context_type}'",
            CONTEXT_TYPES.join(", ")
        )));
    }

    let style = SummaryStyle::for_context(&context_type);
    let result = state
        .analyzer
        .summary()
        .enrich(&query.caption, style, query.max_length)
        .await?;
    Ok(Json(ContextResponse {
        summary: result.text().unwrap_or_default().to_string(),
        context_type,
        style,
        is_demo: result.is_demo,
    }))
}

async fn health(State(state): State<AppState>) -> Json<GroupHealth> {
    let summary = state.analyzer.summary();
    Json(GroupHealth {
        status: "ok",
        service: "llm",
        detail: json!({ "mode": summary.mode(), "demo": summary.is_demo() }),
    })
}
