//! Multi-file endpoints. One bad file never fails the batch.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;

use lens_core::{Capability, InferenceParams};

use super::search::{search_by_caption, SearchResponse};
use super::visual::{run_analysis, VisualResponse};
use super::{AnalyzeQuery, GroupHealth};
use crate::server::error::ApiError;
use crate::server::state::AppState;
use crate::server::upload::Uploads;

/// Search results per image when the caller doesn't say.
const RESULTS_PER_IMAGE: usize = 5;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/analyze-multiple", post(analyze_multiple))
        .route("/search-multiple", post(search_multiple))
        .route("/health", get(health))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct FileError {
    pub error: &'static str,
    pub message: String,
}

impl From<ApiError> for FileError {
    fn from(err: ApiError) -> Self {
        Self {
            error: err.code(),
            message: err.message().to_string(),
        }
    }
}

/// Outcome for one file in a batch.
#[derive(Debug, Serialize)]
pub struct FileOutcome<T> {
    pub filename: String,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FileError>,
}

impl<T> FileOutcome<T> {
    fn new(filename: String, result: Result<T, ApiError>) -> Self {
        match result {
            Ok(response) => Self {
                filename,
                status: FileStatus::Ok,
                response: Some(response),
                error: None,
            },
            Err(err) => {
                tracing::warn!(
                    %filename,
                    code = err.code(),
                    "Batch file failed: {}",
                    err.message()
                );
                Self {
                    filename,
                    status: FileStatus::Failed,
                    response: None,
                    error: Some(err.into()),
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchResponse<T> {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub files: Vec<FileOutcome<T>>,
}

impl<T> BatchResponse<T> {
    fn new(files: Vec<FileOutcome<T>>) -> Self {
        let succeeded = files.iter().filter(|f| f.status == FileStatus::Ok).count();
        Self {
            total: files.len(),
            succeeded,
            failed: files.len() - succeeded,
            files,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchMultipleQuery {
    pub results_per_image: Option<usize>,
}

fn check_batch_size(count: usize, max: usize) -> Result<(), ApiError> {
    if count > max {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "too_many_files",
            format!("Maximum {max} files per batch, got {count}"),
        ));
    }
    Ok(())
}

async fn analyze_multiple(
    State(state): State<AppState>,
    query: Result<Query<AnalyzeQuery>, QueryRejection>,
    Uploads(uploads): Uploads,
) -> Result<Json<BatchResponse<VisualResponse>>, ApiError> {
    let Query(query) = query?;
    check_batch_size(uploads.len(), state.config.limits.max_batch_files)?;
    let options = query.options(state.analyzer.default_options())?;

    let files = join_all(uploads.into_iter().map(|upload| {
        let state = &state;
        let options = &options;
        async move {
            let filename = upload.display_name();
            FileOutcome::new(filename, run_analysis(state, upload, options).await)
        }
    }))
    .await;

    Ok(Json(BatchResponse::new(files)))
}

/// Caption each file, then search with its caption.
async fn search_multiple(
    State(state): State<AppState>,
    query: Result<Query<SearchMultipleQuery>, QueryRejection>,
    Uploads(uploads): Uploads,
) -> Result<Json<BatchResponse<SearchResponse>>, ApiError> {
    let Query(query) = query?;
    check_batch_size(uploads.len(), state.config.limits.max_search_batch_files)?;
    let count = Some(query.results_per_image.unwrap_or(RESULTS_PER_IMAGE));

    let files = join_all(uploads.into_iter().map(|upload| {
        let state = &state;
        async move {
            let filename = upload.display_name();
            let result = async {
                let caption = state
                    .analyzer
                    .infer_one(
                        upload.bytes,
                        &upload.content_type,
                        Capability::Caption,
                        InferenceParams::default(),
                    )
                    .await?;
                let caption = caption.caption().unwrap_or_default().to_string();
                Ok::<_, ApiError>(search_by_caption(state.analyzer.search(), caption, count).await)
            }
            .await;
            FileOutcome::new(filename, result)
        }
    }))
    .await;

    Ok(Json(BatchResponse::new(files)))
}

async fn health(State(state): State<AppState>) -> Json<GroupHealth> {
    let limits = &state.config.limits;
    Json(GroupHealth {
        status: "ok",
        service: "batch",
        detail: json!({
            "max_batch_files": limits.max_batch_files,
            "max_search_batch_files": limits.max_search_batch_files,
        }),
    })
}
