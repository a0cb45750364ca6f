//! Core data types for the Lens analysis pipeline.
//!
//! These types flow through one request: an [`ImageRequest`] comes out of the
//! validator, each model adapter produces one [`InferenceResult`], an enrichment
//! client produces at most one [`EnrichmentResult`], and the assembler folds
//! everything into an [`AnalysisResponse`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::InferenceError;

/// A pretrained capability exposed by a model adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Caption,
    Detection,
    Ocr,
}

impl Capability {
    /// All capabilities in canonical order.
    pub const ALL: [Capability; 3] = [Capability::Caption, Capability::Detection, Capability::Ocr];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Caption => "caption",
            Capability::Detection => "detection",
            Capability::Ocr => "ocr",
        }
    }

    /// Parse a comma-separated list (`"caption,ocr"`), preserving order and
    /// dropping duplicates.
    pub fn parse_list(value: &str) -> Result<Vec<Capability>, String> {
        let mut out = Vec::new();
        for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let capability: Capability = part.parse()?;
            if !out.contains(&capability) {
                out.push(capability);
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "caption" | "captioning" => Ok(Capability::Caption),
            "detection" | "detect" | "objects" => Ok(Capability::Detection),
            "ocr" | "text" => Ok(Capability::Ocr),
            other => Err(format!("unknown capability: {other}")),
        }
    }
}

/// A validated upload, ready for decoding.
///
/// Only the validator constructs this type, so holding one means the size and
/// content-type invariants already hold.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    bytes: Vec<u8>,
    content_type: String,
}

impl ImageRequest {
    pub(crate) fn new(bytes: Vec<u8>, content_type: String) -> Self {
        Self {
            bytes,
            content_type,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Axis-aligned box in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= f32::EPSILON {
            0.0
        } else {
            inter / union
        }
    }
}

/// One detected object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

/// One recognized line of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    pub confidence: f32,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

/// Output of exactly one model adapter call, tagged by capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "capability", rename_all = "lowercase")]
pub enum InferenceResult {
    Caption { text: String },
    Detection { objects: Vec<Detection> },
    Ocr { text: String, blocks: Vec<TextBlock> },
}

impl InferenceResult {
    pub fn capability(&self) -> Capability {
        match self {
            InferenceResult::Caption { .. } => Capability::Caption,
            InferenceResult::Detection { .. } => Capability::Detection,
            InferenceResult::Ocr { .. } => Capability::Ocr,
        }
    }

    /// Caption text, if this is a caption result.
    pub fn caption(&self) -> Option<&str> {
        match self {
            InferenceResult::Caption { text } => Some(text),
            _ => None,
        }
    }
}

/// Outcome of one capability within a request: a result or a tagged failure.
#[derive(Debug, Clone)]
pub struct CapabilityOutcome {
    pub capability: Capability,
    pub result: Result<InferenceResult, InferenceError>,
}

/// Which external service produced an enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentSource {
    Search,
    Summary,
}

/// Which enrichment, if any, a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentKind {
    #[default]
    None,
    Search,
    Summary,
}

impl FromStr for EnrichmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => Ok(EnrichmentKind::None),
            "search" => Ok(EnrichmentKind::Search),
            "summary" | "llm" => Ok(EnrichmentKind::Summary),
            other => Err(format!("unknown enrichment: {other}")),
        }
    }
}

/// One image-search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    pub title: String,
    pub url: String,
    pub thumbnail: String,
    pub source: String,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Enrichment payload: an ordered item list (search) or one text block (summary).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentContent {
    Items(Vec<SearchItem>),
    Text(String),
}

/// Output of at most one enrichment client call per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub source: EnrichmentSource,
    /// Query actually sent (search) or the caption summarized (summary)
    pub query: String,
    #[serde(flatten)]
    pub content: EnrichmentContent,
    /// True when this came from the demo fallback instead of the live API
    pub is_demo: bool,
}

impl EnrichmentResult {
    pub fn items(&self) -> &[SearchItem] {
        match &self.content {
            EnrichmentContent::Items(items) => items,
            EnrichmentContent::Text(_) => &[],
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            EnrichmentContent::Text(text) => Some(text),
            EnrichmentContent::Items(_) => None,
        }
    }
}

/// Per-capability status in a composite response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Ok,
    Failed,
}

/// One capability slot in a composite response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySlot {
    pub capability: Capability,
    pub status: SlotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<InferenceResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The assembled response for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub request_id: Uuid,
    pub elapsed_ms: u64,
    /// Served from the response cache
    pub cached: bool,
    pub results: Vec<CapabilitySlot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichmentResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl AnalysisResponse {
    /// The slot for a capability, if it was requested.
    pub fn slot(&self, capability: Capability) -> Option<&CapabilitySlot> {
        self.results.iter().find(|s| s.capability == capability)
    }

    /// Successful caption text, if any.
    pub fn caption(&self) -> Option<&str> {
        self.slot(Capability::Caption)
            .and_then(|s| s.result.as_ref())
            .and_then(InferenceResult::caption)
    }

    /// Copy of a cached response re-stamped for a new request.
    pub fn replayed(&self, request_id: Uuid, elapsed_ms: u64) -> Self {
        Self {
            request_id,
            elapsed_ms,
            cached: true,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_parse_aliases() {
        assert_eq!("detect".parse::<Capability>().unwrap(), Capability::Detection);
        assert_eq!("TEXT".parse::<Capability>().unwrap(), Capability::Ocr);
        assert!("faces".parse::<Capability>().is_err());
    }

    #[test]
    fn test_capability_parse_list_dedupes_in_order() {
        let list = Capability::parse_list("ocr, caption,ocr").unwrap();
        assert_eq!(list, vec![Capability::Ocr, Capability::Caption]);
        assert!(Capability::parse_list("").unwrap().is_empty());
    }

    #[test]
    fn test_inference_result_tagged_serde() {
        let result = InferenceResult::Detection {
            objects: vec![Detection {
                label: "dog".to_string(),
                confidence: 0.9,
                bbox: BoundingBox::new(1.0, 2.0, 3.0, 4.0),
            }],
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"capability\":\"detection\""));
        assert!(json.contains("\"box\":{"));
    }

    #[test]
    fn test_enrichment_content_shape() {
        let result = EnrichmentResult {
            source: EnrichmentSource::Summary,
            query: "a dog".to_string(),
            content: EnrichmentContent::Text("A dog on grass.".to_string()),
            is_demo: true,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["source"], "summary");
        assert_eq!(json["text"], "A dog on grass.");
        assert_eq!(json["is_demo"], true);
        assert!(result.items().is_empty());
    }

    #[test]
    fn test_iou() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 15.0, 10.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
        assert_eq!(a.iou(&BoundingBox::new(20.0, 20.0, 30.0, 30.0)), 0.0);
    }
}
