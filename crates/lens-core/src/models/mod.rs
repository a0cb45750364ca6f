//! Model adapters: one pretrained capability each, behind a uniform call.
//!
//! Models are loaded once, before the server accepts traffic, into a
//! [`ModelRegistry`]. A model that fails to load is recorded as unavailable;
//! requests for it fail in their own slot while the other capabilities keep
//! working.
//!
//! ```rust,ignore
//! let registry = ModelRegistry::load(&config);
//! let result = registry
//!     .infer(Capability::Caption, Arc::new(image), InferenceParams::default())
//!     .await?;
//! ```

pub mod caption;
pub mod detect;
pub mod labels;
pub mod ocr;
pub(crate) mod preprocess;
pub(crate) mod session;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::DynamicImage;
use tokio::time::timeout;

use crate::config::Config;
use crate::error::InferenceError;
use crate::types::{Capability, InferenceResult};

/// Per-call knobs an adapter may honor.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InferenceParams {
    /// Detection confidence override
    pub confidence_threshold: Option<f32>,
}

/// One pretrained capability.
///
/// `infer` is synchronous and CPU-bound; the registry runs it on the blocking
/// pool. Implementations must be safe to call from several requests at once,
/// serializing internally if the runtime requires it.
pub trait ModelAdapter: Send + Sync {
    fn capability(&self) -> Capability;

    fn infer(
        &self,
        image: &DynamicImage,
        params: &InferenceParams,
    ) -> Result<InferenceResult, InferenceError>;
}

/// Load state of one capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelStatus {
    Ready,
    Unavailable(String),
}

impl std::fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelStatus::Ready => f.write_str("ready"),
            ModelStatus::Unavailable(reason) => write!(f, "unavailable: {reason}"),
        }
    }
}

enum Slot {
    Ready(Arc<dyn ModelAdapter>),
    Unavailable(String),
}

/// Process-wide set of loaded adapters, read-only after construction.
pub struct ModelRegistry {
    slots: BTreeMap<Capability, Slot>,
    timeout_ms: u64,
}

impl ModelRegistry {
    /// An empty registry; every capability is unavailable until added.
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            slots: BTreeMap::new(),
            timeout_ms,
        }
    }

    /// Load every configured model from `model_dir`.
    ///
    /// Never fails: load errors are logged and the capability is marked
    /// unavailable.
    pub fn load(config: &Config) -> Self {
        let model_dir = config.model_dir();
        let mut registry = Self::new(config.limits.inference_timeout_ms);

        for capability in Capability::ALL {
            let start = Instant::now();
            let loaded: Option<Result<Arc<dyn ModelAdapter>, InferenceError>> = match capability {
                Capability::Caption => config.caption.enabled.then(|| {
                    caption::Captioner::load(&config.caption, &model_dir)
                        .map(|a| Arc::new(a) as Arc<dyn ModelAdapter>)
                }),
                Capability::Detection => config.detection.enabled.then(|| {
                    detect::Detector::load(&config.detection, &model_dir)
                        .map(|a| Arc::new(a) as Arc<dyn ModelAdapter>)
                }),
                Capability::Ocr => config.ocr.enabled.then(|| {
                    ocr::TextRecognizer::load(&config.ocr, &model_dir)
                        .map(|a| Arc::new(a) as Arc<dyn ModelAdapter>)
                }),
            };

            registry = match loaded {
                Some(Ok(adapter)) => {
                    tracing::debug!(
                        %capability,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Model ready"
                    );
                    registry.with_adapter(adapter)
                }
                Some(Err(e)) => {
                    tracing::warn!(%capability, "Model unavailable: {e}");
                    registry.with_unavailable(capability, unavailable_reason(&e))
                }
                None => registry.with_unavailable(capability, "disabled in config"),
            };
        }
        registry
    }

    /// Register an adapter under its own capability.
    pub fn with_adapter(mut self, adapter: Arc<dyn ModelAdapter>) -> Self {
        self.slots.insert(adapter.capability(), Slot::Ready(adapter));
        self
    }

    /// Record a capability as unavailable.
    pub fn with_unavailable(mut self, capability: Capability, reason: impl Into<String>) -> Self {
        self.slots
            .insert(capability, Slot::Unavailable(reason.into()));
        self
    }

    pub fn status(&self, capability: Capability) -> ModelStatus {
        match self.slots.get(&capability) {
            Some(Slot::Ready(_)) => ModelStatus::Ready,
            Some(Slot::Unavailable(reason)) => ModelStatus::Unavailable(reason.clone()),
            None => ModelStatus::Unavailable("not loaded".to_string()),
        }
    }

    /// Status of every capability in canonical order.
    pub fn statuses(&self) -> Vec<(Capability, ModelStatus)> {
        Capability::ALL
            .into_iter()
            .map(|c| (c, self.status(c)))
            .collect()
    }

    pub fn is_ready(&self, capability: Capability) -> bool {
        self.status(capability) == ModelStatus::Ready
    }

    /// Run one adapter on the blocking pool under the inference timeout.
    ///
    /// A timed-out call is reported as `Timeout`; the underlying inference
    /// keeps running to completion on its thread since it can't be interrupted.
    pub async fn infer(
        &self,
        capability: Capability,
        image: Arc<DynamicImage>,
        params: InferenceParams,
    ) -> Result<InferenceResult, InferenceError> {
        let adapter = match self.slots.get(&capability) {
            Some(Slot::Ready(adapter)) => Arc::clone(adapter),
            Some(Slot::Unavailable(reason)) => {
                return Err(InferenceError::ModelUnavailable {
                    capability,
                    reason: reason.clone(),
                })
            }
            None => {
                return Err(InferenceError::ModelUnavailable {
                    capability,
                    reason: "not loaded".to_string(),
                })
            }
        };

        let start = Instant::now();
        let result = match timeout(
            Duration::from_millis(self.timeout_ms),
            tokio::task::spawn_blocking(move || adapter.infer(&image, &params)),
        )
        .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(InferenceError::failed(
                capability,
                format!("inference task failed: {e}"),
            )),
            Err(_) => Err(InferenceError::Timeout {
                capability,
                timeout_ms: self.timeout_ms,
            }),
        };

        match &result {
            Ok(_) => tracing::debug!(
                %capability,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Inference complete"
            ),
            Err(e) => tracing::error!(%capability, "Inference failed: {e}"),
        }
        result
    }
}

fn unavailable_reason(err: &InferenceError) -> String {
    match err {
        InferenceError::ModelUnavailable { reason, .. } => reason.clone(),
        other => other.to_string(),
    }
}

/// One file a capability needs on disk.
#[derive(Debug, Clone)]
pub struct ModelFile {
    pub capability: Capability,
    pub name: &'static str,
    pub path: PathBuf,
    /// Download URL, when a source is configured
    pub url: Option<String>,
    /// Expected BLAKE3 digest, when configured
    pub blake3: Option<String>,
    /// Optional files have built-in fallbacks
    pub required: bool,
}

/// Every model file the current config refers to.
pub fn manifest(config: &Config) -> Vec<ModelFile> {
    let model_dir = config.model_dir();
    let mut files = Vec::new();

    let mut push = |capability: Capability,
                    model: &str,
                    source_url: &str,
                    checksums: &BTreeMap<String, String>,
                    name: &'static str,
                    required: bool| {
        let url = (!source_url.is_empty())
            .then(|| format!("{}/{}", source_url.trim_end_matches('/'), name));
        files.push(ModelFile {
            capability,
            name,
            path: model_path(&model_dir, model, name),
            url,
            blake3: checksums.get(name).cloned(),
            required,
        });
    };

    let c = &config.caption;
    for name in [caption::VISION_FILE, caption::DECODER_FILE, caption::TOKENIZER_FILE] {
        push(Capability::Caption, &c.model, &c.source_url, &c.checksums, name, true);
    }
    let d = &config.detection;
    push(Capability::Detection, &d.model, &d.source_url, &d.checksums, detect::MODEL_FILE, true);
    push(Capability::Detection, &d.model, &d.source_url, &d.checksums, detect::LABELS_FILE, false);
    let o = &config.ocr;
    for name in [ocr::MODEL_FILE, ocr::KEYS_FILE] {
        push(Capability::Ocr, &o.model, &o.source_url, &o.checksums, name, true);
    }
    files
}

fn model_path(model_dir: &Path, model: &str, name: &str) -> PathBuf {
    model_dir.join(model).join(name)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Mock adapters shared by pipeline tests.

    use super::*;
    use crate::types::{BoundingBox, Detection};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted adapter that counts calls.
    pub struct MockAdapter {
        pub capability: Capability,
        pub result: Result<InferenceResult, InferenceError>,
        pub delay: Duration,
        pub calls: Arc<AtomicU32>,
    }

    impl MockAdapter {
        pub fn ok(result: InferenceResult) -> Self {
            Self {
                capability: result.capability(),
                result: Ok(result),
                delay: Duration::ZERO,
                calls: Arc::new(AtomicU32::new(0)),
            }
        }

        pub fn failing(capability: Capability, message: &str) -> Self {
            Self {
                capability,
                result: Err(InferenceError::failed(capability, message)),
                delay: Duration::ZERO,
                calls: Arc::new(AtomicU32::new(0)),
            }
        }

        pub fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ModelAdapter for MockAdapter {
        fn capability(&self) -> Capability {
            self.capability
        }

        fn infer(
            &self,
            _image: &DynamicImage,
            params: &InferenceParams,
        ) -> Result<InferenceResult, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            match (&self.result, params.confidence_threshold) {
                (Ok(InferenceResult::Detection { objects }), Some(t)) => {
                    Ok(InferenceResult::Detection {
                        objects: objects
                            .iter()
                            .filter(|d| d.confidence >= t)
                            .cloned()
                            .collect(),
                    })
                }
                (result, _) => result.clone(),
            }
        }
    }

    pub fn caption(text: &str) -> InferenceResult {
        InferenceResult::Caption {
            text: text.to_string(),
        }
    }

    pub fn detections() -> InferenceResult {
        InferenceResult::Detection {
            objects: vec![
                Detection {
                    label: "dog".to_string(),
                    confidence: 0.92,
                    bbox: BoundingBox::new(10.0, 10.0, 50.0, 50.0),
                },
                Detection {
                    label: "ball".to_string(),
                    confidence: 0.6,
                    bbox: BoundingBox::new(60.0, 40.0, 70.0, 50.0),
                },
            ],
        }
    }

    pub fn ocr(text: &str) -> InferenceResult {
        InferenceResult::Ocr {
            text: text.to_string(),
            blocks: vec![],
        }
    }

    /// Registry with working mocks for all three capabilities.
    pub fn full_registry() -> ModelRegistry {
        ModelRegistry::new(5_000)
            .with_adapter(Arc::new(MockAdapter::ok(caption("a dog playing with a ball"))))
            .with_adapter(Arc::new(MockAdapter::ok(detections())))
            .with_adapter(Arc::new(MockAdapter::ok(ocr(""))))
    }
}
