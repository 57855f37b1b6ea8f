//! Wrinkle density from Canny edges on a contrast-equalized, smoothed frame.

use crate::imaging;
use crate::metrics::{Normalization, SkinMetric};
use crate::region::{self, Region};
use crate::types::{Landmarks, MetricResult};
use image::{GrayImage, RgbImage};
use imageproc::filter::bilateral_filter;

const REGIONS: [Region; 3] = [Region::Forehead, Region::LeftEye, Region::RightEye];
const REGION_PADDING: u32 = 10;

const CLAHE_TILES: u32 = 8;
const CLAHE_CLIP_LIMIT: f32 = 2.0;
const BILATERAL_DIAMETER: u32 = 9;
const BILATERAL_SIGMA_COLOR: f32 = 75.0;
const BILATERAL_SIGMA_SPACE: f32 = 75.0;
const CANNY_LOW: f32 = 30.0;
const CANNY_HIGH: f32 = 80.0;

/// Nominal kernel sizes of the multi-scale pass.
///
/// Known limitation: the size does not reach the edge detector, so the three
/// passes are identical and the max over them equals a single pass. Kept so
/// scores stay comparable with earlier releases.
const KERNEL_SIZES: [u32; 3] = [3, 5, 7];

const NORMALIZATION: Normalization = Normalization {
    offset: 100.0,
    factor: 1000.0,
    floor: 20.0,
    ceil: 95.0,
    fallback: 95.0,
};

#[derive(Debug, Default, Clone)]
pub struct WrinkleAnalyzer;

impl WrinkleAnalyzer {
    /// BT.601 grayscale → CLAHE (clip 2.0, 8×8 tiles) → bilateral smoothing.
    pub fn preprocess(frame: &RgbImage) -> GrayImage {
        let mut gray = imaging::gray_bt601(frame);
        imaging::clahe(&mut gray, CLAHE_TILES, CLAHE_CLIP_LIMIT);
        bilateral_filter(&gray, BILATERAL_DIAMETER, BILATERAL_SIGMA_COLOR, BILATERAL_SIGMA_SPACE)
    }

    /// Highest edge density over the kernel passes for one region.
    fn region_density(smoothed: &GrayImage, landmarks: &Landmarks, region: Region) -> Option<f64> {
        let (w, h) = smoothed.dimensions();
        let b = region::resolve(region, landmarks, w, h, REGION_PADDING)?;
        let roi = imaging::crop(smoothed, &b);
        KERNEL_SIZES
            .iter()
            .map(|_ksize| imaging::edge_density(&roi, CANNY_LOW, CANNY_HIGH))
            .reduce(f64::max)
    }
}

impl SkinMetric for WrinkleAnalyzer {
    fn name(&self) -> &'static str {
        "wrinkles"
    }

    fn analyze(&self, frame: &RgbImage, landmarks: &Landmarks) -> MetricResult {
        if landmarks.is_empty() {
            return NORMALIZATION.finish(self.name(), &[]);
        }
        let smoothed = Self::preprocess(frame);
        let regional: Vec<f64> = REGIONS
            .iter()
            .filter_map(|&r| Self::region_density(&smoothed, landmarks, r))
            .collect();
        NORMALIZATION.finish(self.name(), &regional)
    }
}
