//! Single-capability endpoints.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use lens_core::types::{Detection, TextBlock};
use lens_core::{Capability, InferenceParams, InferenceResult};

use super::{check_confidence, GroupHealth};
use crate::server::error::ApiError;
use crate::server::state::AppState;
use crate::server::upload::Upload;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/caption", post(caption))
        .route("/detect", post(detect))
        .route("/ocr", post(ocr))
        .route("/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct CaptionResponse {
    pub caption: String,
}

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub objects: Vec<Detection>,
}

#[derive(Debug, Serialize)]
pub struct OcrResponse {
    pub text: String,
    pub blocks: Vec<TextBlock>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DetectQuery {
    pub confidence: Option<f32>,
}

async fn run(
    state: &AppState,
    upload: Upload,
    capability: Capability,
    params: InferenceParams,
) -> Result<InferenceResult, ApiError> {
    Ok(state
        .analyzer
        .infer_one(upload.bytes, &upload.content_type, capability, params)
        .await?)
}

fn unexpected(capability: Capability, result: &InferenceResult) -> ApiError {
    ApiError::from(lens_core::InferenceError::failed(
        capability,
        format!("adapter returned a {} result", result.capability()),
    ))
}

async fn caption(
    State(state): State<AppState>,
    upload: Upload,
) -> Result<Json<CaptionResponse>, ApiError> {
    match run(&state, upload, Capability::Caption, InferenceParams::default()).await? {
        InferenceResult::Caption { text } => Ok(Json(CaptionResponse { caption: text })),
        other => Err(unexpected(Capability::Caption, &other)),
    }
}

async fn detect(
    State(state): State<AppState>,
    query: Result<Query<DetectQuery>, QueryRejection>,
    upload: Upload,
) -> Result<Json<DetectResponse>, ApiError> {
    let Query(query) = query?;
    let params = InferenceParams {
        confidence_threshold: check_confidence(query.confidence)?,
    };
    match run(&state, upload, Capability::Detection, params).await? {
        InferenceResult::Detection { objects } => Ok(Json(DetectResponse { objects })),
        other => Err(unexpected(Capability::Detection, &other)),
    }
}

async fn ocr(
    State(state): State<AppState>,
    upload: Upload,
) -> Result<Json<OcrResponse>, ApiError> {
    match run(&state, upload, Capability::Ocr, InferenceParams::default()).await? {
        InferenceResult::Ocr { text, blocks } => Ok(Json(OcrResponse { text, blocks })),
        other => Err(unexpected(Capability::Ocr, &other)),
    }
}

async fn health(State(state): State<AppState>) -> Json<GroupHealth> {
    let models = state.analyzer.models();
    let detail: serde_json::Map<String, serde_json::Value> = models
        .statuses()
        .into_iter()
        .map(|(capability, status)| (capability.to_string(), json!(status.to_string())))
        .collect();
    let ready = Capability::ALL.iter().all(|&c| models.is_ready(c));
    Json(GroupHealth {
        status: if ready { "ok" } else { "degraded" },
        service: "analyze",
        detail: json!({ "models": detail }),
    })
}
