//! Under-eye darkness from Lab lightness around both eyes.

use crate::imaging;
use crate::metrics::{Normalization, SkinMetric};
use crate::region::{self, Region};
use crate::types::{Landmarks, MetricResult};
use image::RgbImage;

/// Mid-lightness (8-bit L) that scores best; darker and brighter both lose points.
const REFERENCE_LIGHTNESS: f64 = 70.0;
/// Eye boxes are stretched downward to cover the under-eye area.
const UNDER_EYE_EXTENSION: u32 = 20;
const REGIONS: [Region; 2] = [Region::LeftEye, Region::RightEye];

const NORMALIZATION: Normalization = Normalization {
    offset: 100.0,
    factor: 2.0,
    floor: 20.0,
    ceil: 95.0,
    fallback: 90.0,
};

#[derive(Debug, Default, Clone)]
pub struct DarkCircleAnalyzer;

impl DarkCircleAnalyzer {
    /// `|70 - mean L|` for one eye, or `None` if the eye has no pixels.
    fn region_darkness(frame: &RgbImage, landmarks: &Landmarks, region: Region) -> Option<f64> {
        let (w, h) = frame.dimensions();
        let b = region::project(region.indices(), landmarks, w, h)?
            .extended_down(UNDER_EYE_EXTENSION)
            .clamped(w, h)?;
        let lab = imaging::to_lab8(&imaging::crop(frame, &b));
        Some((REFERENCE_LIGHTNESS - imaging::channel_mean(&lab, 0)).abs())
    }
}

impl SkinMetric for DarkCircleAnalyzer {
    fn name(&self) -> &'static str {
        "dark_circles"
    }

    fn analyze(&self, frame: &RgbImage, landmarks: &Landmarks) -> MetricResult {
        let regional: Vec<f64> = REGIONS
            .iter()
            .filter_map(|&r| Self::region_darkness(frame, landmarks, r))
            .collect();
        NORMALIZATION.finish(self.name(), &regional)
    }
}
