//! Tone uniformity from Lab channel spread over the cheeks and forehead.

use crate::imaging;
use crate::metrics::{Normalization, SkinMetric};
use crate::region::{self, Region};
use crate::types::{Landmarks, MetricResult};
use image::RgbImage;

const REGIONS: [Region; 2] = [Region::Cheeks, Region::Forehead];

/// Lightness spread dominates blotchiness, so it carries the largest weight.
const WEIGHT_L: f64 = 0.4;
const WEIGHT_A: f64 = 0.3;
const WEIGHT_B: f64 = 0.3;

const NORMALIZATION: Normalization = Normalization {
    offset: 100.0,
    factor: 2.5,
    floor: 20.0,
    ceil: 95.0,
    fallback: 90.0,
};

#[derive(Debug, Default, Clone)]
pub struct SkinToneAnalyzer;

impl SkinToneAnalyzer {
    fn region_spread(frame: &RgbImage, landmarks: &Landmarks, region: Region) -> Option<f64> {
        let (w, h) = frame.dimensions();
        let b = region::resolve(region, landmarks, w, h, 0)?;
        let lab = imaging::to_lab8(&imaging::crop(frame, &b));
        Some(
            imaging::channel_std(&lab, 0) * WEIGHT_L
                + imaging::channel_std(&lab, 1) * WEIGHT_A
                + imaging::channel_std(&lab, 2) * WEIGHT_B,
        )
    }
}

impl SkinMetric for SkinToneAnalyzer {
    fn name(&self) -> &'static str {
        "skin_tone"
    }

    fn analyze(&self, frame: &RgbImage, landmarks: &Landmarks) -> MetricResult {
        let regional: Vec<f64> = REGIONS
            .iter()
            .filter_map(|&r| Self::region_spread(frame, landmarks, r))
            .collect();
        NORMALIZATION.finish(self.name(), &regional)
    }
}
