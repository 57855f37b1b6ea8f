//! Virtual makeup: paint feature outlines into a color mask and blend it onto the frame.

use crate::features::{Feature, FeatureGeometry, GeometryError};
use crate::style::MakeupStyle;
use crate::types::Landmarks;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;

/// Constant added to every channel by the blend.
///
/// The blend is a weighted accumulation, `frame + mask·opacity + 1`, rather
/// than a convex mix, so untouched pixels brighten by one level and painted
/// regions can saturate. Output stays byte-compatible with earlier releases.
const BLEND_BIAS: f32 = 1.0;

pub struct MakeupCompositor {
    geometry: FeatureGeometry,
}

impl MakeupCompositor {
    pub fn new(geometry: FeatureGeometry) -> Self {
        Self { geometry }
    }

    /// Compositor over the embedded face-mesh outlines.
    pub fn builtin() -> Result<Self, GeometryError> {
        Ok(Self::new(FeatureGeometry::builtin()?))
    }

    /// Apply `style` to `frame`. Missing or empty landmarks return the frame unchanged.
    pub fn composite(&self, frame: &RgbImage, landmarks: Option<&Landmarks>, style: &MakeupStyle) -> RgbImage {
        let Some(landmarks) = landmarks.filter(|l| !l.is_empty()) else {
            return frame.clone();
        };
        let mask = self.paint_mask(frame.width(), frame.height(), landmarks, style);
        blend(frame, &mask, style.opacity)
    }

    /// Zeroed mask of the frame's size with every feature filled in its style color.
    pub fn paint_mask(&self, width: u32, height: u32, landmarks: &Landmarks, style: &MakeupStyle) -> RgbImage {
        let mut mask = RgbImage::new(width, height);
        for feature in Feature::ALL {
            let Some(outline) = landmarks.project(self.geometry.outline(feature), width, height) else {
                tracing::debug!(feature = feature.name(), "outline index outside keypoint set, skipping");
                continue;
            };
            let Some(polygon) = closed_polygon(&outline) else {
                continue;
            };
            draw_polygon_mut(&mut mask, &polygon, Rgb(style.colors.get(feature)));
        }
        mask
    }
}

/// Strip a repeated closing vertex; `None` when fewer than three vertices remain.
fn closed_polygon(outline: &[(i32, i32)]) -> Option<Vec<Point<i32>>> {
    let mut points: Vec<Point<i32>> = outline.iter().map(|&(x, y)| Point::new(x, y)).collect();
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    (points.len() >= 3).then_some(points)
}

/// Per channel: `saturate(frame + mask·opacity + 1)`, halves rounded to even.
pub fn blend(frame: &RgbImage, mask: &RgbImage, opacity: f32) -> RgbImage {
    let mut out = frame.clone();
    for (o, m) in out.pixels_mut().zip(mask.pixels()) {
        for c in 0..3 {
            let v = o[c] as f32 + m[c] as f32 * opacity + BLEND_BIAS;
            o[c] = v.round_ties_even().clamp(0.0, 255.0) as u8;
        }
    }
    out
}
