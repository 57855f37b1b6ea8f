//! Shared scoring machinery for the skin analyzers and the weighted aggregate.

use crate::dark_circles::DarkCircleAnalyzer;
use crate::skin_tone::SkinToneAnalyzer;
use crate::types::{AnalysisReport, Landmarks, MetricResult, Severity};
use crate::wrinkles::WrinkleAnalyzer;
use image::RgbImage;

const WEIGHT_DARK_CIRCLES: f64 = 0.3;
const WEIGHT_WRINKLES: f64 = 0.3;
const WEIGHT_SKIN_TONE: f64 = 0.4;

/// A per-frame skin metric computed from landmark-defined regions.
pub trait SkinMetric {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    fn analyze(&self, frame: &RgbImage, landmarks: &Landmarks) -> MetricResult;
}

/// Maps a raw regional statistic onto the reported score:
/// `clamp(offset - raw * factor, floor, ceil)`.
#[derive(Debug, Clone, Copy)]
pub struct Normalization {
    pub offset: f64,
    pub factor: f64,
    pub floor: f64,
    pub ceil: f64,
    /// Returned untouched when no region produced data.
    pub fallback: f64,
}

impl Normalization {
    pub fn score(&self, raw: f64) -> f64 {
        (self.offset - raw * self.factor).clamp(self.floor, self.ceil)
    }

    /// Combine per-region statistics (mean over regions with data) into a result.
    pub fn finish(&self, metric: &'static str, regional: &[f64]) -> MetricResult {
        if regional.is_empty() {
            tracing::debug!(metric, score = self.fallback, "no region produced data, using fallback");
            return MetricResult {
                score: self.fallback,
                severity: Severity::from_score(self.fallback),
            };
        }
        let raw = regional.iter().sum::<f64>() / regional.len() as f64;
        let score = self.score(raw);
        tracing::debug!(metric, regions = regional.len(), raw, score, "metric scored");
        MetricResult {
            score: round2(score),
            severity: Severity::from_score(score),
        }
    }
}

/// Round half away from zero to two decimals.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Weighted overall score: 30% dark circles, 30% wrinkles, 40% tone uniformity.
pub fn overall_score(dark_circles: &MetricResult, wrinkles: &MetricResult, skin_tone: &MetricResult) -> f64 {
    round2(
        dark_circles.score * WEIGHT_DARK_CIRCLES
            + wrinkles.score * WEIGHT_WRINKLES
            + skin_tone.score * WEIGHT_SKIN_TONE,
    )
}

/// Runs the three analyzers on one frame and aggregates them.
#[derive(Debug, Default, Clone)]
pub struct SkinAnalyzer {
    dark_circles: DarkCircleAnalyzer,
    wrinkles: WrinkleAnalyzer,
    skin_tone: SkinToneAnalyzer,
}

impl SkinAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyze(&self, frame: &RgbImage, landmarks: &Landmarks) -> AnalysisReport {
        let dark_circles = self.dark_circles.analyze(frame, landmarks);
        let wrinkles = self.wrinkles.analyze(frame, landmarks);
        let skin_tone = self.skin_tone.analyze(frame, landmarks);
        let overall_score = overall_score(&dark_circles, &wrinkles, &skin_tone);

        tracing::info!(
            dark_circles = dark_circles.score,
            wrinkles = wrinkles.score,
            skin_tone = skin_tone.score,
            overall_score,
            "skin analysis complete"
        );

        AnalysisReport {
            dark_circles,
            wrinkles,
            skin_tone,
            overall_score,
        }
    }
}
