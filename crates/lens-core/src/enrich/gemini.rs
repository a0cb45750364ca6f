//! Google Gemini summary provider using the `generateContent` API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::provider::{SummaryProvider, SummaryRequest};
use crate::error::EnrichmentError;

const PROVIDER: &str = "gemini";

/// Gemini text-generation client.
pub struct GeminiProvider {
    api_key: String,
    model: String,
    endpoint: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: &str, model: &str, endpoint: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

// --- Request types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

// --- Response types ---

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

fn request_body(request: &SummaryRequest) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![Part {
                text: request.prompt(),
            }],
        }],
        generation_config: GenerationConfig {
            temperature: 0.7,
            // Roughly four characters per token, with headroom
            max_output_tokens: (request.max_length / 3 + 16) as u32,
        },
    }
}

/// First candidate's first text part.
fn parse_text(body: &str) -> Result<String, EnrichmentError> {
    let resp: GenerateResponse = serde_json::from_str(body).map_err(|e| EnrichmentError::Parse {
        provider: PROVIDER.to_string(),
        message: e.to_string(),
    })?;
    resp.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .map(|p| p.text.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| EnrichmentError::Parse {
            provider: PROVIDER.to_string(),
            message: "response contained no text".to_string(),
        })
}

#[async_trait]
impl SummaryProvider for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<String, EnrichmentError> {
        tracing::info!("Requesting {} summary from Gemini ({})", request.style, self.model);
        let resp = self
            .client
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body(request))
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
        parse_text(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::SummaryStyle;

    #[test]
    fn test_url_trims_trailing_slash() {
        let provider = GeminiProvider::new("k", "gemini-1.5-flash", "http://localhost:9/v1beta/");
        assert_eq!(
            provider.url(),
            "http://localhost:9/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let request = SummaryRequest {
            caption: "a red bicycle".to_string(),
            style: SummaryStyle::Concise,
            max_length: 150,
        };
        let json = serde_json::to_value(request_body(&request)).unwrap();
        let text = json["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(text.contains("a red bicycle"));
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 66);
    }

    #[test]
    fn test_parse_text() {
        let body = concat!(
            r#"{"candidates":[{"content":"#,
            r#"{"parts":[{"text":"  A red bicycle.\n"}],"role":"model"}}]}"#,
        );
        assert_eq!(parse_text(body).unwrap(), "A red bicycle.");

        assert!(matches!(
            parse_text(r#"{"candidates":[]}"#),
            Err(EnrichmentError::Parse { .. })
        ));
        assert!(parse_text("not json").is_err());
    }
}
