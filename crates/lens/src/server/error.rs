//! HTTP error mapping.
//!
//! Every failure leaves the server as `{error, message, request_id?}` with a
//! status that tells the caller whose fault it was.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use lens_core::{EnrichmentError, InferenceError, LensError, ValidationError};

/// Error returned by every handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    request_id: Option<Uuid>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<Uuid>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            request_id: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn too_many_requests(window_secs: u64) -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            format!("Too many requests, retry within {window_secs}s"),
        )
    }

    pub fn with_request_id(self, request_id: Uuid) -> Self {
        Self {
            request_id: Some(request_id),
            ..self
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, "{}", self.message);
        } else {
            tracing::debug!(code = self.code, "{}", self.message);
        }
        let body = ErrorBody {
            error: self.code,
            message: &self.message,
            request_id: self.request_id,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let (status, code) = match &err {
            ValidationError::PayloadTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large")
            }
            ValidationError::UnsupportedMediaType { .. } => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_media_type")
            }
            ValidationError::MalformedImage { .. } => (StatusCode::BAD_REQUEST, "malformed_image"),
            ValidationError::EmptyPayload => (StatusCode::BAD_REQUEST, "empty_payload"),
        };
        Self::new(status, code, err.to_string())
    }
}

impl From<InferenceError> for ApiError {
    fn from(err: InferenceError) -> Self {
        let (status, code) = match &err {
            InferenceError::ModelUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "model_unavailable")
            }
            InferenceError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "inference_timeout"),
            InferenceError::Decode { .. } | InferenceError::ImageTooLarge { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "undecodable_image")
            }
            InferenceError::Failed { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "inference_failed")
            }
        };
        Self::new(status, code, err.to_string())
    }
}

impl From<EnrichmentError> for ApiError {
    fn from(err: EnrichmentError) -> Self {
        if err.is_client_error() {
            Self::new(StatusCode::BAD_REQUEST, "invalid_request", err.to_string())
        } else {
            Self::new(StatusCode::BAD_GATEWAY, "enrichment_failed", err.to_string())
        }
    }
}

impl From<LensError> for ApiError {
    fn from(err: LensError) -> Self {
        match err {
            LensError::Validation(e) => e.into(),
            LensError::Inference(e) => e.into(),
            LensError::Enrichment(e) => e.into(),
            LensError::Deadline { .. } => {
                Self::new(StatusCode::GATEWAY_TIMEOUT, "deadline_exceeded", err.to_string())
            }
            other => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                other.to_string(),
            ),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(err: MultipartRejection) -> Self {
        Self::new(err.status(), "invalid_multipart", err.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        let status = err.status();
        let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "payload_too_large"
        } else {
            "invalid_multipart"
        };
        Self::new(status, code, err.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(err: QueryRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_query", err.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        Self::new(err.status(), "invalid_json", err.body_text())
    }
}
