//! Pixel primitives shared by the analyzers: ROI crops, 8-bit Lab
//! conversion, BT.601 grayscale, channel statistics, CLAHE and edge density.

use crate::types::PixelBox;
use image::{GrayImage, ImageBuffer, Luma, Pixel, RgbImage};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use palette::{IntoColor, Lab, Srgb};

/// Copy the sub-image covered by `b`. The box must already be clamped to the frame.
pub fn crop<P: Pixel + 'static>(img: &ImageBuffer<P, Vec<P::Subpixel>>, b: &PixelBox) -> ImageBuffer<P, Vec<P::Subpixel>> {
    image::imageops::crop_imm(img, b.x1 as u32, b.y1 as u32, b.width() as u32, b.height() as u32)
        .to_image()
}

/// Convert RGB pixels to CIE L*a*b* (D65) in the 8-bit encoding used by
/// common vision toolkits: `L·255/100`, `a+128`, `b+128`, each rounded and
/// saturated to `0..=255`.
///
/// The analyzer reference values (mid-lightness 70, the spread factors) are
/// calibrated against this encoding, not against raw L*a*b*.
pub fn to_lab8(rgb: &RgbImage) -> Vec<[f32; 3]> {
    rgb.pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            let lab: Lab = Srgb::new(r, g, b).into_format::<f32>().into_color();
            [
                quantize(lab.l * 255.0 / 100.0),
                quantize(lab.a + 128.0),
                quantize(lab.b + 128.0),
            ]
        })
        .collect()
}

fn quantize(v: f32) -> f32 {
    v.round().clamp(0.0, 255.0)
}

/// Mean of one channel. 0.0 for an empty slice.
pub fn channel_mean(pixels: &[[f32; 3]], channel: usize) -> f64 {
    if pixels.is_empty() {
        return 0.0;
    }
    pixels.iter().map(|p| p[channel] as f64).sum::<f64>() / pixels.len() as f64
}

/// Population standard deviation of one channel.
pub fn channel_std(pixels: &[[f32; 3]], channel: usize) -> f64 {
    if pixels.is_empty() {
        return 0.0;
    }
    let mean = channel_mean(pixels, channel);
    let variance = pixels
        .iter()
        .map(|p| (p[channel] as f64 - mean).powi(2))
        .sum::<f64>()
        / pixels.len() as f64;
    variance.sqrt()
}

/// Contrast-Limited Adaptive Histogram Equalization, in place.
///
/// `clip_limit` follows the usual convention: a bin may hold at most
/// `clip_limit × (tile pixels / 256)` counts before the excess is spread
/// over all bins. Tile lookup tables are blended bilinearly between tile
/// centers. Frames smaller than the tile grid are left untouched.
pub fn clahe(gray: &mut GrayImage, tiles: u32, clip_limit: f32) {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let t = tiles as usize;
    if t == 0 || w < t || h < t {
        return;
    }
    let tile_w = w / t;
    let tile_h = h / t;
    let tile_pixels = tile_w * tile_h;
    let clip = ((clip_limit * tile_pixels as f32 / 256.0) as u32).max(1);
    let lut_scale = 255.0 / tile_pixels as f32;

    let mut luts: Vec<[u8; 256]> = Vec::with_capacity(t * t);
    for row in 0..t {
        for col in 0..t {
            let mut hist = [0u32; 256];
            for y in row * tile_h..(row + 1) * tile_h {
                for x in col * tile_w..(col + 1) * tile_w {
                    hist[gray.get_pixel(x as u32, y as u32)[0] as usize] += 1;
                }
            }

            let mut excess = 0u32;
            for bin in hist.iter_mut() {
                if *bin > clip {
                    excess += *bin - clip;
                    *bin = clip;
                }
            }
            let redist = excess / 256;
            let leftover = (excess % 256) as usize;
            for (i, bin) in hist.iter_mut().enumerate() {
                *bin += redist + u32::from(i < leftover);
            }

            let mut lut = [0u8; 256];
            let mut acc = 0u32;
            for (i, bin) in hist.iter().enumerate() {
                acc += bin;
                lut[i] = (acc as f32 * lut_scale).round().clamp(0.0, 255.0) as u8;
            }
            luts.push(lut);
        }
    }

    for y in 0..h {
        let fy = (y as f32 / tile_h as f32 - 0.5).clamp(0.0, (t - 1) as f32);
        let r0 = fy as usize;
        let r1 = (r0 + 1).min(t - 1);
        let dy = fy - r0 as f32;
        for x in 0..w {
            let fx = (x as f32 / tile_w as f32 - 0.5).clamp(0.0, (t - 1) as f32);
            let c0 = fx as usize;
            let c1 = (c0 + 1).min(t - 1);
            let dx = fx - c0 as f32;

            let px = gray.get_pixel(x as u32, y as u32)[0] as usize;
            let tl = luts[r0 * t + c0][px] as f32;
            let tr = luts[r0 * t + c1][px] as f32;
            let bl = luts[r1 * t + c0][px] as f32;
            let br = luts[r1 * t + c1][px] as f32;

            let top = tl * (1.0 - dx) + tr * dx;
            let bot = bl * (1.0 - dx) + br * dx;
            let val = top * (1.0 - dy) + bot * dy;
            gray.put_pixel(x as u32, y as u32, Luma([val.round().clamp(0.0, 255.0) as u8]));
        }
    }
}

/// Luma with BT.601 weights (0.299, 0.587, 0.114), rounded.
pub fn gray_bt601(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let v = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        Luma([v.round().clamp(0.0, 255.0) as u8])
    })
}

/// tan(22.5°) and tan(67.5°) for quantizing gradient direction.
const TAN_22_5: f32 = 0.414_213_56;
const TAN_67_5: f32 = 2.414_213_6;

/// Fraction of pixels marked as edges by Canny with the given hysteresis
/// thresholds.
///
/// No smoothing is applied before the gradients: callers denoise first.
/// Magnitude is `|gx| + |gy|` over 3×3 Sobel, followed by non-maximum
/// suppression and 8-connected hysteresis. The one-pixel border is never an edge.
pub fn edge_density(roi: &GrayImage, low: f32, high: f32) -> f64 {
    let (w, h) = (roi.width() as usize, roi.height() as usize);
    let total = w * h;
    if w < 3 || h < 3 {
        return 0.0;
    }

    let gx = horizontal_sobel(roi);
    let gy = vertical_sobel(roi);
    let grad = |x: usize, y: usize| {
        (gx.get_pixel(x as u32, y as u32)[0] as f32, gy.get_pixel(x as u32, y as u32)[0] as f32)
    };
    let mag: Vec<f32> = (0..total)
        .map(|i| {
            let (dx, dy) = grad(i % w, i / w);
            dx.abs() + dy.abs()
        })
        .collect();

    // 0 = suppressed, 1 = weak, 2 = strong.
    let mut class = vec![0u8; total];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let m = mag[y * w + x];
            if m <= low {
                continue;
            }
            let (dx, dy) = grad(x, y);
            let (ax, ay) = (dx.abs(), dy.abs());
            let (before, after) = if ay <= ax * TAN_22_5 {
                (mag[y * w + x - 1], mag[y * w + x + 1])
            } else if ay >= ax * TAN_67_5 {
                (mag[(y - 1) * w + x], mag[(y + 1) * w + x])
            } else if (dx > 0.0) == (dy > 0.0) {
                (mag[(y - 1) * w + x - 1], mag[(y + 1) * w + x + 1])
            } else {
                (mag[(y - 1) * w + x + 1], mag[(y + 1) * w + x - 1])
            };
            if m > before && m >= after {
                class[y * w + x] = if m > high { 2 } else { 1 };
            }
        }
    }

    let mut stack: Vec<usize> = (0..total).filter(|&i| class[i] == 2).collect();
    let mut edge = vec![false; total];
    for &i in &stack {
        edge[i] = true;
    }
    while let Some(i) = stack.pop() {
        let (x, y) = (i % w, i / w);
        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                let j = ny * w + nx;
                if class[j] == 1 && !edge[j] {
                    edge[j] = true;
                    stack.push(j);
                }
            }
        }
    }

    let count = edge.iter().filter(|&&e| e).count();
    count as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn stddev(img: &GrayImage) -> f32 {
        let n = (img.width() * img.height()) as f32;
        let mean = img.pixels().map(|p| p[0] as f32).sum::<f32>() / n;
        let var = img.pixels().map(|p| (p[0] as f32 - mean).powi(2)).sum::<f32>() / n;
        var.sqrt()
    }

    #[test]
    fn test_lab8_reference_colors() {
        let img = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) });
        let lab = to_lab8(&img);
        assert_eq!(lab[0], [255.0, 128.0, 128.0]);
        assert_eq!(lab[1], [0.0, 128.0, 128.0]);
    }

    #[test]
    fn test_lab8_gray_is_neutral() {
        let img = RgbImage::from_pixel(1, 1, Rgb([119, 119, 119]));
        let [l, a, b] = to_lab8(&img)[0];
        // sRGB 119 ≈ L* 50.
        assert!((l - 127.0).abs() <= 2.0, "L = {l}");
        assert_eq!(a, 128.0);
        assert_eq!(b, 128.0);
    }

    #[test]
    fn test_channel_stats() {
        let pixels = vec![[2.0, 0.0, 0.0], [4.0, 0.0, 0.0], [4.0, 0.0, 0.0], [4.0, 0.0, 0.0],
                          [5.0, 0.0, 0.0], [5.0, 0.0, 0.0], [7.0, 0.0, 0.0], [9.0, 0.0, 0.0]];
        assert!((channel_mean(&pixels, 0) - 5.0).abs() < 1e-9);
        assert!((channel_std(&pixels, 0) - 2.0).abs() < 1e-9);
        assert_eq!(channel_std(&[], 1), 0.0);
    }

    #[test]
    fn test_crop_extracts_box() {
        let img = GrayImage::from_fn(10, 10, |x, y| Luma([(y * 10 + x) as u8]));
        let roi = crop(&img, &PixelBox { x1: 2, y1: 3, x2: 5, y2: 7 });
        assert_eq!(roi.dimensions(), (3, 4));
        assert_eq!(roi.get_pixel(0, 0)[0], 32);
    }

    #[test]
    fn test_clahe_increases_contrast() {
        let mut gray = GrayImage::from_fn(64, 64, |x, y| Luma([100 + ((x + y) % 11) as u8]));
        let before = stddev(&gray);
        clahe(&mut gray, 8, 2.0);
        let after = stddev(&gray);
        assert!(after > before, "CLAHE should increase contrast: {before:.2} -> {after:.2}");
    }

    #[test]
    fn test_clahe_tiny_frame_untouched() {
        let mut gray = GrayImage::from_pixel(4, 4, Luma([77]));
        let copy = gray.clone();
        clahe(&mut gray, 8, 2.0);
        assert_eq!(gray, copy);
    }

    #[test]
    fn test_gray_bt601_weights() {
        let img = RgbImage::from_fn(3, 1, |x, _| match x {
            0 => Rgb([255, 0, 0]),
            1 => Rgb([0, 255, 0]),
            _ => Rgb([0, 0, 255]),
        });
        let gray = gray_bt601(&img);
        assert_eq!(gray.get_pixel(0, 0)[0], 76);
        assert_eq!(gray.get_pixel(1, 0)[0], 150);
        assert_eq!(gray.get_pixel(2, 0)[0], 29);
    }

    #[test]
    fn test_edge_density_flat_is_zero() {
        let gray = GrayImage::from_pixel(30, 30, Luma([128]));
        assert_eq!(edge_density(&gray, 30.0, 80.0), 0.0);
    }

    #[test]
    fn test_edge_density_detects_stripes() {
        let gray = GrayImage::from_fn(40, 40, |x, _| Luma([if (x / 5) % 2 == 0 { 20 } else { 230 }]));
        assert!(edge_density(&gray, 30.0, 80.0) > 0.05);
    }

    #[test]
    fn test_edge_density_keeps_one_pixel_lines() {
        // Fine creases: 1-px lines 40 levels darker every 6 rows.
        let gray = GrayImage::from_fn(60, 60, |_, y| Luma([if y % 6 == 0 { 110 } else { 150 }]));
        let density = edge_density(&gray, 30.0, 80.0);
        assert!(density > 0.15, "thin lines lost: {density}");
    }

    #[test]
    fn test_edge_density_weak_edge_needs_strong_neighbor() {
        // Step of 12 levels: |gy| = 48, between low and high, never seeded.
        let gray = GrayImage::from_fn(20, 20, |_, y| Luma([if y < 10 { 100 } else { 112 }]));
        assert_eq!(edge_density(&gray, 30.0, 80.0), 0.0);
    }
}
