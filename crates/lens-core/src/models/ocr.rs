//! Text extraction with a CTC line recogniser.
//!
//! Expects `{model_dir}/{ocr.model}/rec.onnx` taking `[1, 3, H, W]` in
//! [-1, 1] with dynamic width and producing `[1, T, classes]`, plus a
//! `keys.txt` dictionary (one symbol per line). Class 0 is the CTC blank and
//! the class after the last key is a space.
//!
//! Lines are found by horizontal ink projection on a binarised copy of the
//! image, then each line is recognised independently.

use std::path::Path;
use std::sync::Mutex;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage};
use ort::session::Session;
use ort::value::Value;

use super::preprocess::{into_ort_parts, to_tensor, SYMMETRIC_NORM};
use super::session::{first_input_name, load_session, lock, ort_err, require_file};
use super::{InferenceParams, ModelAdapter};
use crate::config::OcrConfig;
use crate::error::InferenceError;
use crate::types::{BoundingBox, Capability, InferenceResult, TextBlock};

pub const MODEL_FILE: &str = "rec.onnx";
pub const KEYS_FILE: &str = "keys.txt";

const CAP: Capability = Capability::Ocr;
const MAX_LINE_WIDTH: u32 = 2048;
const LINE_PAD: u32 = 2;

/// Greedy CTC decoder over a symbol table whose index 0 is the blank.
#[derive(Debug, Clone)]
pub struct CtcDecoder {
    symbols: Vec<String>,
}

impl CtcDecoder {
    /// Build from a `keys.txt` body: blank, one symbol per line, then space.
    pub fn from_keys(keys: &str) -> Self {
        let mut symbols = vec![String::new()];
        symbols.extend(
            keys.lines()
                .map(|l| l.trim_end_matches(['\r', '\n']))
                .filter(|l| !l.is_empty())
                .map(String::from),
        );
        symbols.push(" ".to_string());
        Self { symbols }
    }

    pub fn num_classes(&self) -> usize {
        self.symbols.len()
    }

    /// Decode `[steps, classes]` probabilities: best class per step, collapse
    /// repeats, drop blanks. Confidence is the mean probability of the kept
    /// characters (0 when nothing is kept).
    pub fn decode(&self, probs: &[f32], classes: usize) -> (String, f32) {
        let mut text = String::new();
        let mut kept = Vec::new();
        let mut prev = 0usize;

        for row in probs.chunks_exact(classes) {
            let (idx, p) = row
                .iter()
                .copied()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                });
            if idx != 0 && idx != prev {
                if let Some(symbol) = self.symbols.get(idx) {
                    text.push_str(symbol);
                    kept.push(p);
                }
            }
            prev = idx;
        }

        let confidence = if kept.is_empty() {
            0.0
        } else {
            kept.iter().sum::<f32>() / kept.len() as f32
        };
        (text.trim().to_string(), confidence)
    }
}

/// Softmax rows in place unless they already look like probabilities.
pub fn ensure_probabilities(data: &mut [f32], classes: usize) {
    for row in data.chunks_exact_mut(classes) {
        let sum: f32 = row.iter().sum();
        let in_range = row.iter().all(|v| (0.0..=1.0).contains(v));
        if in_range && (sum - 1.0).abs() < 1e-2 {
            continue;
        }
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut total = 0.0;
        for v in row.iter_mut() {
            *v = (*v - max).exp();
            total += *v;
        }
        for v in row.iter_mut() {
            *v /= total;
        }
    }
}

/// A text line region in source pixels (exclusive max edges).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Otsu threshold over a 256-bin histogram.
fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut hist = [0u64; 256];
    for p in gray.as_raw() {
        hist[*p as usize] += 1;
    }
    let total: u64 = hist.iter().sum();
    let sum_all: f64 = hist.iter().enumerate().map(|(i, &c)| i as f64 * c as f64).sum();

    let (mut sum_bg, mut weight_bg) = (0f64, 0u64);
    let (mut best, mut best_var) = (0u8, -1f64);
    for (t, &count) in hist.iter().enumerate() {
        weight_bg += count;
        if weight_bg == 0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0 {
            break;
        }
        sum_bg += t as f64 * count as f64;
        let mean_bg = sum_bg / weight_bg as f64;
        let mean_fg = (sum_all - sum_bg) / weight_fg as f64;
        let var = weight_bg as f64 * weight_fg as f64 * (mean_bg - mean_fg).powi(2);
        if var > best_var {
            best_var = var;
            best = t as u8;
        }
    }
    best
}

/// Find text lines by horizontal ink projection.
///
/// Ink is the minority side of an Otsu split, so both dark-on-light and
/// light-on-dark text work. Rows separated by gaps of at most two blank rows
/// join the same line; lines shorter than four rows are dropped.
pub fn segment_lines(gray: &GrayImage) -> Vec<LineRegion> {
    let (w, h) = gray.dimensions();
    let raw = gray.as_raw();
    let (min, max) = raw
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &p| (lo.min(p), hi.max(p)));
    if w == 0 || h == 0 || min == max {
        return vec![];
    }

    let t = otsu_threshold(gray);
    let dark = raw.iter().filter(|&&p| p <= t).count();
    let dark_is_ink = dark * 2 <= raw.len();
    let is_ink = |p: u8| if dark_is_ink { p <= t } else { p > t };

    let min_ink = (w / 200).max(1) as usize;
    let ink_rows: Vec<bool> = raw
        .chunks_exact(w as usize)
        .map(|row| row.iter().filter(|&&p| is_ink(p)).count() >= min_ink)
        .collect();

    let mut runs: Vec<(u32, u32)> = Vec::new();
    for (y, &ink) in ink_rows.iter().enumerate() {
        if !ink {
            continue;
        }
        let y = y as u32;
        match runs.last_mut() {
            Some((_, end)) if y <= *end + 3 => *end = y,
            _ => runs.push((y, y)),
        }
    }

    runs.into_iter()
        .filter(|(start, end)| end - start + 1 >= 4)
        .filter_map(|(start, end)| {
            let mut x_min = u32::MAX;
            let mut x_max = 0;
            for y in start..=end {
                let row = &raw[(y * w) as usize..((y + 1) * w) as usize];
                for (x, &p) in row.iter().enumerate() {
                    if is_ink(p) {
                        x_min = x_min.min(x as u32);
                        x_max = x_max.max(x as u32);
                    }
                }
            }
            (x_min <= x_max).then(|| {
                let x = x_min.saturating_sub(LINE_PAD);
                let y = start.saturating_sub(LINE_PAD);
                let x2 = (x_max + 1 + LINE_PAD).min(w);
                let y2 = (end + 1 + LINE_PAD).min(h);
                LineRegion {
                    x,
                    y,
                    width: x2 - x,
                    height: y2 - y,
                }
            })
        })
        .collect()
}

/// CTC recogniser behind a single-flight session lock.
pub struct TextRecognizer {
    session: Mutex<Session>,
    input_name: String,
    decoder: CtcDecoder,
    line_height: u32,
    min_confidence: f32,
}

impl TextRecognizer {
    pub fn load(config: &OcrConfig, model_dir: &Path) -> Result<Self, InferenceError> {
        let dir = model_dir.join(&config.model);
        let keys_path = dir.join(KEYS_FILE);
        require_file(&keys_path, CAP)?;
        let keys = std::fs::read_to_string(&keys_path).map_err(|e| {
            InferenceError::ModelUnavailable {
                capability: CAP,
                reason: format!("cannot read {}: {e}", keys_path.display()),
            }
        })?;

        let session = load_session(&dir.join(MODEL_FILE), CAP)?;
        let input_name = first_input_name(&session, "x");
        let decoder = CtcDecoder::from_keys(&keys);
        tracing::info!(model = %config.model, symbols = decoder.num_classes(), "OCR model loaded");

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            decoder,
            line_height: config.line_height,
            min_confidence: config.min_confidence,
        })
    }

    fn recognize_line(&self, line: &DynamicImage) -> Result<(String, f32), InferenceError> {
        let (w, h) = line.dimensions();
        let width = ((w as f32 * self.line_height as f32 / h.max(1) as f32).ceil() as u32)
            .clamp(self.line_height / 3, MAX_LINE_WIDTH);
        let rgb = line
            .resize_exact(width, self.line_height, FilterType::Triangle)
            .to_rgb8();
        let input = Value::from_array(into_ort_parts(to_tensor(&rgb, SYMMETRIC_NORM)))
            .map_err(ort_err(CAP, "failed to create input tensor"))?;

        let (shape, mut data) = {
            let mut session = lock(&self.session, CAP)?;
            let outputs = session
                .run(ort::inputs![self.input_name.as_str() => input])
                .map_err(ort_err(CAP, "ONNX inference failed"))?;
            let (_, output) = outputs
                .iter()
                .next()
                .ok_or_else(|| InferenceError::failed(CAP, "model produced no outputs"))?;
            let (shape, data) = output
                .try_extract_tensor::<f32>()
                .map_err(ort_err(CAP, "failed to extract output tensor"))?;
            (shape.iter().copied().collect::<Vec<i64>>(), data.to_vec())
        };

        let classes = match shape.as_slice() {
            [1, _, c] | [_, c] => *c as usize,
            other => {
                return Err(InferenceError::failed(
                    CAP,
                    format!("unexpected output shape {other:?}"),
                ))
            }
        };
        if classes == 0 || data.len() % classes != 0 {
            return Err(InferenceError::failed(CAP, "output size mismatch"));
        }
        ensure_probabilities(&mut data, classes);
        Ok(self.decoder.decode(&data, classes))
    }
}

impl ModelAdapter for TextRecognizer {
    fn capability(&self) -> Capability {
        CAP
    }

    fn infer(
        &self,
        image: &DynamicImage,
        _params: &InferenceParams,
    ) -> Result<InferenceResult, InferenceError> {
        let gray = image.to_luma8();
        let mut blocks = Vec::new();

        for region in segment_lines(&gray) {
            let crop = image.crop_imm(region.x, region.y, region.width, region.height);
            let (text, confidence) = self.recognize_line(&crop)?;
            if text.is_empty() || confidence < self.min_confidence {
                continue;
            }
            blocks.push(TextBlock {
                text,
                confidence,
                bbox: BoundingBox::new(
                    region.x as f32,
                    region.y as f32,
                    (region.x + region.width) as f32,
                    (region.y + region.height) as f32,
                ),
            });
        }

        let text = blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(InferenceResult::Ocr { text, blocks })
    }
}
