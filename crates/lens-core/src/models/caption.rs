//! Image captioning with a BLIP encoder/decoder ONNX export.
//!
//! Expects three files under `{model_dir}/{caption.model}/`:
//! - `vision_model.onnx`: `pixel_values [1, 3, S, S]` to `[1, N, D]` image embeddings
//! - `text_decoder.onnx`: `input_ids [1, T]`, `attention_mask [1, T]`,
//!   `encoder_hidden_states [1, N, D]` to `logits [1, T, vocab]`
//! - `tokenizer.json`
//!
//! Decoding is greedy, so the same image always yields the same caption.

use std::path::Path;
use std::sync::Mutex;

use image::imageops::FilterType;
use image::DynamicImage;
use ort::session::Session;
use ort::value::Value;
use tokenizers::Tokenizer;

use super::preprocess::{into_ort_parts, resize_normalized, CLIP_NORM};
use super::session::{first_input_name, load_session, lock, ort_err, require_file};
use super::{InferenceParams, ModelAdapter};
use crate::config::CaptionConfig;
use crate::error::InferenceError;
use crate::types::{Capability, InferenceResult};

pub const VISION_FILE: &str = "vision_model.onnx";
pub const DECODER_FILE: &str = "text_decoder.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

const CAP: Capability = Capability::Caption;

// BLIP's decoder start and end tokens, used when the tokenizer lacks them.
const DEFAULT_BOS: i64 = 30522;
const DEFAULT_EOS: i64 = 102;

/// Run greedy decoding from `bos` until `eos` or `max_tokens` new tokens.
///
/// `step` receives the sequence so far and returns the logits for the next
/// token. The returned ids exclude `bos` and `eos`.
pub fn greedy_decode<F>(
    bos: i64,
    eos: i64,
    max_tokens: usize,
    mut step: F,
) -> Result<Vec<i64>, InferenceError>
where
    F: FnMut(&[i64]) -> Result<Vec<f32>, InferenceError>,
{
    let mut ids = vec![bos];
    for _ in 0..max_tokens {
        let logits = step(&ids)?;
        let next = logits
            .iter()
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |best, (i, &v)| {
                if v > best.1 {
                    (i, v)
                } else {
                    best
                }
            })
            .0 as i64;
        if next == eos {
            break;
        }
        ids.push(next);
    }
    Ok(ids.split_off(1))
}

/// BLIP captioner. Each session sits behind its own lock.
pub struct Captioner {
    vision: Mutex<Session>,
    vision_input: String,
    decoder: Mutex<Session>,
    tokenizer: Tokenizer,
    image_size: u32,
    max_tokens: usize,
    bos: i64,
    eos: i64,
}

impl Captioner {
    pub fn load(config: &CaptionConfig, model_dir: &Path) -> Result<Self, InferenceError> {
        let dir = model_dir.join(&config.model);
        let tokenizer_path = dir.join(TOKENIZER_FILE);
        require_file(&tokenizer_path, CAP)?;
        let tokenizer =
            Tokenizer::from_file(&tokenizer_path).map_err(|e| InferenceError::ModelUnavailable {
                capability: CAP,
                reason: format!("failed to load tokenizer: {e}"),
            })?;

        let vision = load_session(&dir.join(VISION_FILE), CAP)?;
        let vision_input = first_input_name(&vision, "pixel_values");
        let decoder = load_session(&dir.join(DECODER_FILE), CAP)?;

        let bos = tokenizer
            .token_to_id("[DEC]")
            .map(i64::from)
            .unwrap_or(DEFAULT_BOS);
        let eos = tokenizer
            .token_to_id("[SEP]")
            .map(i64::from)
            .unwrap_or(DEFAULT_EOS);
        tracing::info!(model = %config.model, "Caption model loaded");

        Ok(Self {
            vision: Mutex::new(vision),
            vision_input,
            decoder: Mutex::new(decoder),
            tokenizer,
            image_size: config.image_size,
            max_tokens: config.max_tokens,
            bos,
            eos,
        })
    }

    /// Encode the image into `(shape, hidden states)`.
    fn encode(&self, image: &DynamicImage) -> Result<(Vec<i64>, Vec<f32>), InferenceError> {
        let tensor = resize_normalized(
            image,
            self.image_size,
            self.image_size,
            FilterType::CatmullRom,
            CLIP_NORM,
        );
        let input = Value::from_array(into_ort_parts(tensor))
            .map_err(ort_err(CAP, "failed to create pixel tensor"))?;

        let mut session = lock(&self.vision, CAP)?;
        let outputs = session
            .run(ort::inputs![self.vision_input.as_str() => input])
            .map_err(ort_err(CAP, "vision encoder failed"))?;
        let (_, hidden) = outputs
            .iter()
            .find(|(name, _)| *name == "last_hidden_state" || *name == "image_embeds")
            .or_else(|| outputs.iter().next())
            .ok_or_else(|| InferenceError::failed(CAP, "vision encoder produced no outputs"))?;
        let (shape, data) = hidden
            .try_extract_tensor::<f32>()
            .map_err(ort_err(CAP, "failed to extract image embeddings"))?;
        Ok((shape.iter().copied().collect(), data.to_vec()))
    }

    /// Logits for the token after `ids`.
    fn next_logits(
        &self,
        ids: &[i64],
        hidden_shape: &[i64],
        hidden: &[f32],
    ) -> Result<Vec<f32>, InferenceError> {
        let len = ids.len() as i64;
        let input_ids = Value::from_array((vec![1, len], ids.to_vec()))
            .map_err(ort_err(CAP, "failed to create input_ids"))?;
        let mask = Value::from_array((vec![1, len], vec![1i64; ids.len()]))
            .map_err(ort_err(CAP, "failed to create attention_mask"))?;
        let states = Value::from_array((hidden_shape.to_vec(), hidden.to_vec()))
            .map_err(ort_err(CAP, "failed to create encoder_hidden_states"))?;

        let mut session = lock(&self.decoder, CAP)?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => mask,
                "encoder_hidden_states" => states,
            ])
            .map_err(ort_err(CAP, "text decoder failed"))?;
        let (_, logits) = outputs
            .iter()
            .find(|(name, _)| *name == "logits")
            .or_else(|| outputs.iter().next())
            .ok_or_else(|| InferenceError::failed(CAP, "text decoder produced no outputs"))?;
        let (shape, data) = logits
            .try_extract_tensor::<f32>()
            .map_err(ort_err(CAP, "failed to extract logits"))?;

        let vocab = shape.last().copied().unwrap_or(0) as usize;
        if vocab == 0 || data.len() < vocab {
            return Err(InferenceError::failed(
                CAP,
                format!("unexpected logits shape {:?}", shape.to_vec()),
            ));
        }
        Ok(data[data.len() - vocab..].to_vec())
    }
}

impl ModelAdapter for Captioner {
    fn capability(&self) -> Capability {
        CAP
    }

    fn infer(
        &self,
        image: &DynamicImage,
        _params: &InferenceParams,
    ) -> Result<InferenceResult, InferenceError> {
        let (hidden_shape, hidden) = self.encode(image)?;
        let ids = greedy_decode(self.bos, self.eos, self.max_tokens, |ids| {
            self.next_logits(ids, &hidden_shape, &hidden)
        })?;

        let ids: Vec<u32> = ids.into_iter().map(|id| id as u32).collect();
        let text = self
            .tokenizer
            .decode(&ids, true)
            .map_err(|e| InferenceError::failed(CAP, format!("failed to decode tokens: {e}")))?;
        Ok(InferenceResult::Caption {
            text: text.trim().to_string(),
        })
    }
}
