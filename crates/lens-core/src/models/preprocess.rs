//! Image-to-tensor conversion shared by the model adapters.
//!
//! All tensors are NCHW `[1, 3, H, W]` in RGB order.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;

/// Per-channel normalization constants.
#[derive(Debug, Clone, Copy)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

/// CLIP/BLIP statistics.
pub const CLIP_NORM: Normalization = Normalization {
    mean: [0.481_454_66, 0.457_827_5, 0.408_210_73],
    std: [0.268_629_54, 0.261_302_58, 0.275_777_11],
};

/// Plain [0, 1] scaling.
pub const UNIT_NORM: Normalization = Normalization {
    mean: [0.0; 3],
    std: [1.0; 3],
};

/// Maps [0, 255] to [-1, 1].
pub const SYMMETRIC_NORM: Normalization = Normalization {
    mean: [0.5; 3],
    std: [0.5; 3],
};

/// Write an RGB image into a fresh NCHW tensor.
pub fn to_tensor(rgb: &RgbImage, norm: Normalization) -> Array4<f32> {
    let (w, h) = rgb.dimensions();
    let (w, h) = (w as usize, h as usize);
    let raw = rgb.as_raw();
    Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| {
        (raw[(y * w + x) * 3 + c] as f32 / 255.0 - norm.mean[c]) / norm.std[c]
    })
}

/// Stretch-resize to `width × height` and normalize.
pub fn resize_normalized(
    image: &DynamicImage,
    width: u32,
    height: u32,
    filter: FilterType,
    norm: Normalization,
) -> Array4<f32> {
    let rgb = image.resize_exact(width, height, filter).to_rgb8();
    to_tensor(&rgb, norm)
}

/// Geometry of a letterbox transform, used to map boxes back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    /// Map a point from model input space back to source pixels.
    pub fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Aspect-preserving resize into a `size × size` square padded with grey (114).
pub fn letterbox(image: &DynamicImage, size: u32) -> (Array4<f32>, Letterbox) {
    let (w, h) = image.dimensions();
    let scale = (size as f32 / w.max(1) as f32).min(size as f32 / h.max(1) as f32);
    let new_w = ((w as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((h as f32 * scale).round() as u32).clamp(1, size);
    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;

    let resized = image
        .resize_exact(new_w, new_h, FilterType::Triangle)
        .to_rgb8();
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([114, 114, 114]));
    image::imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    (
        to_tensor(&canvas, UNIT_NORM),
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    )
}

/// Flatten a tensor into the `(shape, data)` pair `ort` accepts.
pub fn into_ort_parts(tensor: Array4<f32>) -> (Vec<i64>, Vec<f32>) {
    let shape = tensor.shape().iter().map(|&d| d as i64).collect();
    (shape, tensor.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_normalized_shape_and_range() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 20, Rgb([255, 255, 255])));
        let tensor = resize_normalized(&img, 384, 384, FilterType::CatmullRom, SYMMETRIC_NORM);
        assert_eq!(tensor.shape(), &[1, 3, 384, 384]);
        let max = tensor.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        assert!((max - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_letterbox_wide_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 100, Rgb([0, 0, 0])));
        let (tensor, lb) = letterbox(&img, 64);
        assert_eq!(tensor.shape(), &[1, 3, 64, 64]);
        assert!((lb.scale - 0.32).abs() < 1e-6);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 16.0);

        // Padding rows are grey, content rows are black.
        assert!((tensor[[0, 0, 0, 10]] - 114.0 / 255.0).abs() < 1e-6);
        assert_eq!(tensor[[0, 0, 32, 10]], 0.0);

        let (x, y) = lb.unmap(32.0, 16.0);
        assert!((x - 100.0).abs() < 1e-3);
        assert!(y.abs() < 1e-3);
    }

    #[test]
    fn test_to_tensor_channel_layout() {
        let img = RgbImage::from_pixel(2, 2, Rgb([255, 0, 0]));
        let tensor = to_tensor(&img, UNIT_NORM);
        assert_eq!(tensor[[0, 0, 1, 1]], 1.0);
        assert_eq!(tensor[[0, 1, 1, 1]], 0.0);
        let (shape, data) = into_ort_parts(tensor);
        assert_eq!(shape, vec![1, 3, 2, 2]);
        assert_eq!(data.len(), 12);
    }
}
