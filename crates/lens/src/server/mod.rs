//! HTTP server: router assembly and shared plumbing.
//!
//! Routes are grouped by surface (`/analyze`, `/search`, `/llm`, `/visual`,
//! `/batch`) and each group has its own `/health`.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod upload;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;

pub use error::ApiError;
pub use state::AppState;

/// Multipart framing allowance on top of the raw file bytes.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let config = state.config.clone();
    let max_files = config
        .limits
        .max_batch_files
        .max(config.limits.max_search_batch_files)
        .max(1);
    // One byte over the upload limit must still reach the validator
    let file_limit = config.limits.max_upload_bytes as usize + 1;
    let single_limit = file_limit.saturating_add(MULTIPART_OVERHEAD);
    let batch_limit = file_limit
        .saturating_mul(max_files)
        .saturating_add(MULTIPART_OVERHEAD);

    let mut app = Router::new()
        .route("/", get(routes::health::index))
        .route("/health", get(routes::health::health))
        .nest("/analyze", routes::analyze::routes())
        .nest("/search", routes::search::routes())
        .nest("/llm", routes::llm::routes())
        .nest("/visual", routes::visual::routes())
        .layer(DefaultBodyLimit::max(single_limit))
        .nest(
            "/batch",
            routes::batch::routes().layer(DefaultBodyLimit::max(batch_limit)),
        );

    if let Some(limiter) = middleware::RateLimiter::from_config(&config.server) {
        app = app.layer(axum::middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_by_ip,
        ));
    }

    app.layer(middleware::cors_layer(&config.server))
        .layer(middleware::trace_layer())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use image::{DynamicImage, ImageFormat};
    use serde_json::{json, Value};

    use lens_core::types::{BoundingBox, Detection, TextBlock};
    use lens_core::{
        Analyzer, Capability, Config, InferenceError, InferenceParams, InferenceResult,
        ModelAdapter, ModelRegistry, SearchClient, SummaryClient,
    };

    use super::*;

    struct StubAdapter {
        capability: Capability,
        result: Result<InferenceResult, InferenceError>,
    }

    impl ModelAdapter for StubAdapter {
        fn capability(&self) -> Capability {
            self.capability
        }

        fn infer(
            &self,
            _image: &image::DynamicImage,
            _params: &InferenceParams,
        ) -> Result<InferenceResult, InferenceError> {
            self.result.clone()
        }
    }

    fn stub(capability: Capability, result: InferenceResult) -> Arc<dyn ModelAdapter> {
        Arc::new(StubAdapter {
            capability,
            result: Ok(result),
        })
    }

    fn registry(ocr_fails: bool) -> ModelRegistry {
        let bbox = BoundingBox::new(1.0, 1.0, 6.0, 6.0);
        let ocr: Arc<dyn ModelAdapter> = if ocr_fails {
            Arc::new(StubAdapter {
                capability: Capability::Ocr,
                result: Err(InferenceError::failed(Capability::Ocr, "session crashed")),
            })
        } else {
            stub(
                Capability::Ocr,
                InferenceResult::Ocr {
                    text: "OPEN".to_string(),
                    blocks: vec![TextBlock {
                        text: "OPEN".to_string(),
                        confidence: 0.9,
                        bbox,
                    }],
                },
            )
        };
        ModelRegistry::new(5000)
            .with_adapter(stub(
                Capability::Caption,
                InferenceResult::Caption {
                    text: "a dog sitting on a beach".to_string(),
                },
            ))
            .with_adapter(stub(
                Capability::Detection,
                InferenceResult::Detection {
                    objects: vec![Detection {
                        label: "dog".to_string(),
                        confidence: 0.88,
                        bbox,
                    }],
                },
            ))
            .with_adapter(ocr)
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.limits.max_upload_bytes = 64 * 1024;
        config.server.rate_limit_requests = 0;
        config
    }

    fn server_with(config: Config, ocr_fails: bool) -> TestServer {
        let analyzer = Analyzer::with_clients(
            &config,
            Arc::new(registry(ocr_fails)),
            SearchClient::demo(&config.search),
            SummaryClient::demo(&config.summary),
        );
        TestServer::new(router(AppState::new(config, analyzer))).unwrap()
    }

    fn server() -> TestServer {
        server_with(test_config(), false)
    }

    fn png_bytes() -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::new_rgb8(8, 6)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn image_form(field: &str, bytes: Vec<u8>, name: &str, mime: &str) -> MultipartForm {
        MultipartForm::new().add_part(field, Part::bytes(bytes).file_name(name).mime_type(mime))
    }

    fn png_form() -> MultipartForm {
        image_form("file", png_bytes(), "photo.png", "image/png")
    }

    #[tokio::test]
    async fn test_health_reports_models_and_modes() {
        let response = server().get("/health").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["models"]["caption"], "ready");
        assert_eq!(body["enrichment"]["search"], "demo");
        assert_eq!(body["enrichment"]["summary"], "demo");
    }

    #[tokio::test]
    async fn test_group_health_routes() {
        let server = server();
        for group in ["analyze", "search", "llm", "visual", "batch"] {
            let response = server.get(&format!("/{group}/health")).await;
            response.assert_status_ok();
            let body: Value = response.json();
            assert_eq!(body["service"], group);
        }
    }

    #[tokio::test]
    async fn test_caption_endpoint() {
        let response = server().post("/analyze/caption").multipart(png_form()).await;
        response.assert_status_ok();
        response.assert_json(&json!({ "caption": "a dog sitting on a beach" }));
    }

    #[tokio::test]
    async fn test_detect_and_ocr_shapes() {
        let server = server();

        let response = server.post("/analyze/detect").multipart(png_form()).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["objects"][0]["label"], "dog");
        assert_eq!(body["objects"][0]["box"]["x2"], 6.0);

        let response = server.post("/analyze/ocr").multipart(png_form()).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["text"], "OPEN");
        assert_eq!(body["blocks"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_detect_rejects_out_of_range_confidence() {
        let response = server()
            .post("/analyze/detect")
            .add_query_param("confidence", "1.5")
            .multipart(png_form())
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_upload_is_413() {
        let bytes = vec![0u8; 64 * 1024 + 1];
        let response = server()
            .post("/analyze/caption")
            .multipart(image_form("file", bytes, "big.png", "image/png"))
            .await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        let body: Value = response.json();
        assert_eq!(body["error"], "payload_too_large");
    }

    #[tokio::test]
    async fn test_unsupported_type_is_415() {
        let response = server()
            .post("/analyze/caption")
            .multipart(image_form("file", b"hello".to_vec(), "notes.txt", "text/plain"))
            .await;
        response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_missing_file_is_400() {
        let form = MultipartForm::new().add_text("caption", "no file here");
        let response = server().post("/analyze/caption").multipart(form).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_visual_analyze_survives_failed_adapter() {
        let response = server_with(test_config(), true)
            .post("/visual/analyze")
            .multipart(png_form())
            .await;
        response.assert_status_ok();
        let body: Value = response.json();

        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        let ocr = results.iter().find(|s| s["capability"] == "ocr").unwrap();
        assert_eq!(ocr["status"], "failed");
        assert!(ocr["error"].as_str().unwrap().contains("session crashed"));
        let caption = results.iter().find(|s| s["capability"] == "caption").unwrap();
        assert_eq!(caption["status"], "ok");

        assert_eq!(body["enrichment"]["source"], "search");
        assert_eq!(body["enrichment"]["is_demo"], true);
        assert!(body["categories"]
            .as_array()
            .unwrap()
            .contains(&json!("animals")));
        assert_eq!(body["image"]["width"], 8);
        assert_eq!(body["image"]["filename"], "photo.png");
    }

    #[tokio::test]
    async fn test_quick_scan_skips_enrichment() {
        let response = server().post("/visual/quick-scan").multipart(png_form()).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert!(body.get("enrichment").is_none());
        assert_eq!(body["results"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_search_by_image_demo() {
        let response = server()
            .post("/search/image")
            .add_query_param("count", "3")
            .multipart(png_form())
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["description"], "a dog sitting on a beach");
        assert_eq!(body["is_demo"], true);
        assert_eq!(body["results"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_smart_search_classifies_caption() {
        let response = server().post("/visual/smart-search").multipart(png_form()).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["detected_type"], "general");
        assert_eq!(body["is_demo"], true);
        assert!(!body["contextual_query"].as_str().unwrap().is_empty());
        assert_eq!(body["results"].as_array().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_llm_summary_demo() {
        let response = server()
            .post("/llm/summary")
            .json(&json!({ "caption": "a dog sitting on a beach", "style": "concise" }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["is_demo"], true);
        assert_eq!(body["style"], "concise");
        assert_eq!(body["summary"], "A dog sitting on a beach");
    }

    #[tokio::test]
    async fn test_llm_summary_rejects_empty_caption() {
        let response = server()
            .post("/llm/summary")
            .json(&json!({ "caption": "   " }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_contextual_summary_rejects_unknown_context() {
        let response = server()
            .post("/llm/contextual-summary")
            .add_query_param("caption", "a red dress")
            .add_query_param("context_type", "astrology")
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_contextual_summary_rejects_zero_max_length() {
        let response = server()
            .post("/llm/contextual-summary")
            .add_query_param("caption", "a dog sitting on a beach")
            .add_query_param("max_length", 0)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"], "invalid_request");
    }

    #[tokio::test]
    async fn test_contextual_summary_honours_max_length() {
        let server = server();
        let full = server
            .post("/llm/contextual-summary")
            .add_query_param("caption", "a dog sitting on a beach")
            .add_query_param("context_type", "general")
            .await;
        full.assert_status_ok();
        let full: Value = full.json();
        assert!(full["summary"].as_str().unwrap().chars().count() > 20);

        let response = server
            .post("/llm/contextual-summary")
            .add_query_param("caption", "a dog sitting on a beach")
            .add_query_param("context_type", "general")
            .add_query_param("max_length", 20)
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        let summary = body["summary"].as_str().unwrap();
        assert!(!summary.is_empty());
        assert!(summary.chars().count() <= 20, "{summary}");
        assert_eq!(body["context_type"], "general");
    }

    fn padded_form(field: &str, files: usize) -> MultipartForm {
        let mut form = MultipartForm::new().add_text("note", "x".repeat(1200 * 1024));
        for i in 0..files {
            form = form.add_part(
                field,
                Part::bytes(png_bytes())
                    .file_name(format!("photo-{i}.png"))
                    .mime_type("image/png"),
            );
        }
        form
    }

    #[tokio::test]
    async fn test_single_file_routes_use_single_upload_limit() {
        let response = server()
            .post("/analyze/caption")
            .multipart(padded_form("file", 1))
            .await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        let body: Value = response.json();
        assert_eq!(body["error"], "payload_too_large");
    }

    #[tokio::test]
    async fn test_batch_routes_use_batch_limit() {
        let response = server()
            .post("/batch/analyze-multiple")
            .add_query_param("enrichment", "none")
            .multipart(padded_form("files", 2))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["total"], 2);
        assert_eq!(body["succeeded"], 2);
    }

    #[tokio::test]
    async fn test_single_upload_takes_first_file() {
        let form = png_form().add_part(
            "file",
            Part::bytes(b"not an image".to_vec())
                .file_name("second.png")
                .mime_type("image/png"),
        );
        let response = server().post("/visual/quick-scan").multipart(form).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["image"]["filename"], "photo.png");
    }

    #[tokio::test]
    async fn test_batch_reports_per_file_outcomes() {
        let form = MultipartForm::new()
            .add_part(
                "files",
                Part::bytes(png_bytes())
                    .file_name("good.png")
                    .mime_type("image/png"),
            )
            .add_part(
                "files",
                Part::bytes(b"not an image".to_vec())
                    .file_name("bad.png")
                    .mime_type("image/png"),
            );
        let response = server()
            .post("/batch/analyze-multiple")
            .add_query_param("enrichment", "none")
            .multipart(form)
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["total"], 2);
        assert_eq!(body["succeeded"], 1);
        assert_eq!(body["files"][0]["filename"], "good.png");
        assert_eq!(body["files"][1]["status"], "failed");
        assert_eq!(body["files"][1]["error"]["error"], "malformed_image");
    }

    #[tokio::test]
    async fn test_batch_rejects_too_many_files() {
        let mut config = test_config();
        config.limits.max_search_batch_files = 1;
        let form = (0..2).fold(MultipartForm::new(), |form, i| {
            form.add_part(
                "files",
                Part::bytes(png_bytes())
                    .file_name(format!("{i}.png"))
                    .mime_type("image/png"),
            )
        });
        let response = server_with(config, false)
            .post("/batch/search-multiple")
            .multipart(form)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"], "too_many_files");
    }

    #[tokio::test]
    async fn test_rate_limit_returns_429() {
        let mut config = test_config();
        config.server.rate_limit_requests = 2;
        let server = server_with(config, false);

        server.get("/health").await.assert_status_ok();
        server.get("/health").await.assert_status_ok();
        let response = server.get("/health").await;
        response.assert_status(StatusCode::TOO_MANY_REQUESTS);
        let body: Value = response.json();
        assert_eq!(body["error"], "rate_limited");
    }
}
