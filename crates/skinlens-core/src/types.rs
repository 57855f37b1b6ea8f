use serde::{Deserialize, Serialize};

/// Number of keypoints produced by the MediaPipe face mesh.
pub const FACE_MESH_POINTS: usize = 468;

/// A facial keypoint in normalized image coordinates (`[0, 1]` on both axes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Project into pixel space. Truncates toward zero, so a point at
    /// x = 0.999 on a 100px frame lands on column 99.
    pub fn to_pixel(&self, width: u32, height: u32) -> (i32, i32) {
        (
            (self.x * width as f32) as i32,
            (self.y * height as f32) as i32,
        )
    }
}

/// Ordered keypoint set for one face. Index → anatomical point is fixed by
/// the landmark model and shared by every consumer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmarks {
    points: Vec<Keypoint>,
}

impl Landmarks {
    pub fn new(points: Vec<Keypoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Keypoint> {
        self.points.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keypoint> {
        self.points.iter()
    }

    /// Pixel coordinates of `indices`, or `None` if any index is outside the set.
    pub fn project(&self, indices: &[usize], width: u32, height: u32) -> Option<Vec<(i32, i32)>> {
        indices
            .iter()
            .map(|&i| self.points.get(i).map(|p| p.to_pixel(width, height)))
            .collect()
    }
}

/// Axis-aligned box in pixel space, half-open: `[x1, x2) × [y1, y2)`.
///
/// Coordinates are signed because keypoints near the frame edge can project
/// outside the image before clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl PixelBox {
    /// Componentwise min/max over `points`. `None` for an empty slice.
    pub fn enclosing(points: &[(i32, i32)]) -> Option<Self> {
        let (&(fx, fy), rest) = points.split_first()?;
        let mut b = PixelBox { x1: fx, y1: fy, x2: fx, y2: fy };
        for &(x, y) in rest {
            b.x1 = b.x1.min(x);
            b.y1 = b.y1.min(y);
            b.x2 = b.x2.max(x);
            b.y2 = b.y2.max(y);
        }
        Some(b)
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub fn center_x(&self) -> f32 {
        (self.x1 + self.x2) as f32 / 2.0
    }

    /// Grow by `padding` pixels on every side.
    pub fn padded(self, padding: u32) -> Self {
        let p = padding as i32;
        PixelBox {
            x1: self.x1 - p,
            y1: self.y1 - p,
            x2: self.x2 + p,
            y2: self.y2 + p,
        }
    }

    /// Move the bottom edge down by `pixels`.
    pub fn extended_down(self, pixels: u32) -> Self {
        PixelBox { y2: self.y2 + pixels as i32, ..self }
    }

    /// Intersect with the `width × height` frame. `None` when nothing with
    /// positive area remains.
    pub fn clamped(self, width: u32, height: u32) -> Option<Self> {
        let b = PixelBox {
            x1: self.x1.clamp(0, width as i32),
            y1: self.y1.clamp(0, height as i32),
            x2: self.x2.clamp(0, width as i32),
            y2: self.y2.clamp(0, height as i32),
        };
        (b.width() > 0 && b.height() > 0).then_some(b)
    }
}

/// Qualitative bucket for a metric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Excellent,
    Good,
    Fair,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
}

impl Severity {
    /// ≥85 Excellent, ≥70 Good, ≥50 Fair, else Needs Improvement.
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            Severity::Excellent
        } else if score >= 70.0 {
            Severity::Good
        } else if score >= 50.0 {
            Severity::Fair
        } else {
            Severity::NeedsImprovement
        }
    }
}

/// Score in `[0, 100]` plus its severity bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub score: f64,
    pub severity: Severity,
}

/// The three skin metrics and their weighted overall score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub dark_circles: MetricResult,
    pub wrinkles: MetricResult,
    pub skin_tone: MetricResult,
    pub overall_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_thresholds() {
        assert_eq!(Severity::from_score(85.0), Severity::Excellent);
        assert_eq!(Severity::from_score(84.999), Severity::Good);
        assert_eq!(Severity::from_score(70.0), Severity::Good);
        assert_eq!(Severity::from_score(69.999), Severity::Fair);
        assert_eq!(Severity::from_score(50.0), Severity::Fair);
        assert_eq!(Severity::from_score(49.999), Severity::NeedsImprovement);
        assert_eq!(Severity::from_score(0.0), Severity::NeedsImprovement);
    }

    #[test]
    fn test_severity_serializes_with_space() {
        let json = serde_json::to_string(&Severity::NeedsImprovement).unwrap();
        assert_eq!(json, "\"Needs Improvement\"");
    }

    #[test]
    fn test_keypoint_truncates() {
        let p = Keypoint::new(0.999, 0.5);
        assert_eq!(p.to_pixel(100, 100), (99, 50));
    }

    #[test]
    fn test_enclosing_empty() {
        assert!(PixelBox::enclosing(&[]).is_none());
    }

    #[test]
    fn test_enclosing_min_max() {
        let b = PixelBox::enclosing(&[(10, 40), (30, 20), (20, 30)]).unwrap();
        assert_eq!(b, PixelBox { x1: 10, y1: 20, x2: 30, y2: 40 });
    }

    #[test]
    fn test_clamped_zero_area() {
        let b = PixelBox { x1: 5, y1: 5, x2: 5, y2: 20 };
        assert!(b.clamped(100, 100).is_none());
    }

    #[test]
    fn test_clamped_outside_frame() {
        let b = PixelBox { x1: 120, y1: 10, x2: 150, y2: 20 };
        assert!(b.clamped(100, 100).is_none());
    }

    #[test]
    fn test_padded_then_clamped() {
        let b = PixelBox { x1: 5, y1: 50, x2: 20, y2: 95 }.padded(10);
        assert_eq!(
            b.clamped(100, 100),
            Some(PixelBox { x1: 0, y1: 40, x2: 30, y2: 100 })
        );
    }

    #[test]
    fn test_project_out_of_range() {
        let lm = Landmarks::new(vec![Keypoint::new(0.1, 0.1)]);
        assert!(lm.project(&[0, 1], 10, 10).is_none());
        assert_eq!(lm.project(&[0], 10, 10), Some(vec![(1, 1)]));
    }
}
