//! Multipart upload extractors.

use std::path::Path;

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::StatusCode;
use serde::Serialize;

use lens_core::pipeline::discovery::content_type_for_path;
use lens_core::pipeline::header_dimensions;

use super::error::ApiError;

const OCTET_STREAM: &str = "application/octet-stream";

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Descriptive summary for responses.
    pub fn info(&self) -> ImageInfo {
        let dims = header_dimensions(&self.bytes);
        ImageInfo {
            filename: self.filename.clone(),
            size: self.bytes.len() as u64,
            content_type: self.content_type.clone(),
            width: dims.map(|(w, _)| w),
            height: dims.map(|(_, h)| h),
        }
    }

    pub fn display_name(&self) -> String {
        self.filename.clone().unwrap_or_else(|| "upload".to_string())
    }
}

/// Upload metadata echoed back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ImageInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub size: u64,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Declared type, falling back to the filename extension.
fn resolve_content_type(declared: Option<&str>, filename: Option<&str>) -> String {
    match declared {
        Some(ct) if !ct.is_empty() && ct != OCTET_STREAM => ct.to_string(),
        _ => filename
            .and_then(|name| content_type_for_path(Path::new(name)))
            .unwrap_or(OCTET_STREAM)
            .to_string(),
    }
}

/// File fields in form order. With `first_only`, the rest of the body is left unread.
async fn read_files(mut multipart: Multipart, first_only: bool) -> Result<Vec<Upload>, ApiError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let is_file = field.file_name().is_some() || matches!(field.name(), Some("file" | "files"));
        if !is_file {
            continue;
        }
        let filename = field.file_name().map(String::from);
        let content_type = resolve_content_type(field.content_type(), filename.as_deref());
        let bytes = field.bytes().await?.to_vec();
        uploads.push(Upload {
            filename,
            content_type,
            bytes,
        });
        if first_only {
            break;
        }
    }
    Ok(uploads)
}

/// Exactly one file, from a `file` field.
impl<S: Send + Sync> FromRequest<S> for Upload {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state).await?;
        read_files(multipart, true)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::bad_request("Missing file upload (multipart field `file`)"))
    }
}

/// Every file in the form, in upload order.
#[derive(Debug)]
pub struct Uploads(pub Vec<Upload>);

impl<S: Send + Sync> FromRequest<S> for Uploads {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state).await?;
        let uploads = read_files(multipart, false).await?;
        if uploads.is_empty() {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "no_files",
                "No files uploaded (multipart field `files`)",
            ));
        }
        Ok(Uploads(uploads))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_content_type() {
        assert_eq!(resolve_content_type(Some("image/png"), Some("a.jpg")), "image/png");
        assert_eq!(resolve_content_type(Some(OCTET_STREAM), Some("a.JPG")), "image/jpeg");
        assert_eq!(resolve_content_type(None, Some("scan.webp")), "image/webp");
        assert_eq!(resolve_content_type(None, Some("notes.txt")), OCTET_STREAM);
        assert_eq!(resolve_content_type(None, None), OCTET_STREAM);
    }
}
