//! Service index and liveness.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::json;

use lens_core::{ModelStatus, VERSION};

use crate::server::state::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    /// `ready` or `unavailable: reason`, per capability
    pub models: BTreeMap<String, String>,
    /// `demo` or the live provider name, per client
    pub enrichment: BTreeMap<&'static str, String>,
}

/// `ok` when every model loaded, `degraded` otherwise. Always 200.
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    let analyzer = &state.analyzer;
    let statuses = analyzer.models().statuses();
    let degraded = statuses
        .iter()
        .any(|(_, status)| !matches!(status, ModelStatus::Ready));

    Json(Health {
        status: if degraded { "degraded" } else { "ok" },
        version: VERSION,
        models: statuses
            .into_iter()
            .map(|(capability, status)| (capability.to_string(), status.to_string()))
            .collect(),
        enrichment: BTreeMap::from([
            ("search", analyzer.search().mode().to_string()),
            ("summary", analyzer.summary().mode().to_string()),
        ]),
    })
}

/// Endpoint directory.
pub async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "service": "lens",
        "version": VERSION,
        "endpoints": {
            "analyze": ["POST /analyze/caption", "POST /analyze/detect", "POST /analyze/ocr"],
            "search": ["POST /search/image", "POST /search/by-image"],
            "llm": [
                "POST /llm/summary",
                "POST /llm/enhance-caption",
                "POST /llm/contextual-summary"
            ],
            "visual": [
                "POST /visual/analyze",
                "POST /visual/quick-scan",
                "POST /visual/smart-search"
            ],
            "batch": ["POST /batch/analyze-multiple", "POST /batch/search-multiple"],
            "health": ["GET /health", "GET /{analyze,search,llm,visual,batch}/health"]
        }
    }))
}
