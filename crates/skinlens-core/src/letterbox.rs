//! Aspect-preserving resize into a square NCHW model input.

use image::{imageops::FilterType, RgbImage};
use ndarray::Array4;

/// Metadata for coordinate de-mapping after letterbox resize.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    pub fn fit(width: u32, height: u32, target: u32) -> Self {
        let scale = (target as f32 / width as f32).min(target as f32 / height as f32);
        let new_w = (width as f32 * scale).round();
        let new_h = (height as f32 * scale).round();
        Letterbox {
            scale,
            pad_x: ((target as f32 - new_w) / 2.0).floor(),
            pad_y: ((target as f32 - new_h) / 2.0).floor(),
        }
    }

    /// Model-input pixel → source-image pixel.
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Letterbox `frame` into a 1×3×`size`×`size` tensor.
///
/// Each RGB byte goes through `normalize`; padding is filled with `pad`
/// (already in normalized units).
pub(crate) fn letterbox_tensor(
    frame: &RgbImage,
    size: u32,
    pad: f32,
    normalize: impl Fn(u8) -> f32,
) -> (Array4<f32>, Letterbox) {
    let (width, height) = frame.dimensions();
    let letterbox = Letterbox::fit(width, height, size);
    let new_w = ((width as f32 * letterbox.scale).round() as u32).clamp(1, size);
    let new_h = ((height as f32 * letterbox.scale).round() as u32).clamp(1, size);
    let resized = image::imageops::resize(frame, new_w, new_h, FilterType::Triangle);

    let side = size as usize;
    let mut tensor = Array4::<f32>::from_elem((1, 3, side, side), pad);
    let (px, py) = (letterbox.pad_x as usize, letterbox.pad_y as usize);
    for (x, y, p) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, py + y as usize, px + x as usize]] = normalize(p[c]);
        }
    }

    (tensor, letterbox)
}
