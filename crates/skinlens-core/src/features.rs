//! Makeup features and their keypoint outlines.
//!
//! The outlines live in `contrib/makeup/features.toml` and are embedded at
//! compile time.

use serde::Deserialize;
use thiserror::Error;

const BUILTIN_FEATURES: &str = include_str!("../../../contrib/makeup/features.toml");

/// A facial feature the compositor can paint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    LipUpper,
    LipLower,
    EyebrowLeft,
    EyebrowRight,
    EyelinerLeft,
    EyelinerRight,
    EyeshadowLeft,
    EyeshadowRight,
}

impl Feature {
    /// Paint order. Later features cover earlier ones where they overlap.
    pub const ALL: [Feature; 8] = [
        Feature::LipLower,
        Feature::LipUpper,
        Feature::EyebrowLeft,
        Feature::EyebrowRight,
        Feature::EyelinerLeft,
        Feature::EyelinerRight,
        Feature::EyeshadowLeft,
        Feature::EyeshadowRight,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::LipUpper => "lip_upper",
            Feature::LipLower => "lip_lower",
            Feature::EyebrowLeft => "eyebrow_left",
            Feature::EyebrowRight => "eyebrow_right",
            Feature::EyelinerLeft => "eyeliner_left",
            Feature::EyelinerRight => "eyeliner_right",
            Feature::EyeshadowLeft => "eyeshadow_left",
            Feature::EyeshadowRight => "eyeshadow_right",
        }
    }
}

#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("bad feature geometry TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("feature {0} has fewer than 3 keypoints")]
    Degenerate(&'static str),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct GeometryFile {
    polygons: FeatureGeometry,
}

/// Keypoint index outline for every [`Feature`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureGeometry {
    lip_upper: Vec<usize>,
    lip_lower: Vec<usize>,
    eyebrow_left: Vec<usize>,
    eyebrow_right: Vec<usize>,
    eyeliner_left: Vec<usize>,
    eyeliner_right: Vec<usize>,
    eyeshadow_left: Vec<usize>,
    eyeshadow_right: Vec<usize>,
}

impl FeatureGeometry {
    /// The embedded face-mesh outlines.
    pub fn builtin() -> Result<Self, GeometryError> {
        Self::from_toml(BUILTIN_FEATURES)
    }

    pub fn from_toml(src: &str) -> Result<Self, GeometryError> {
        let geometry = toml::from_str::<GeometryFile>(src)?.polygons;
        for feature in Feature::ALL {
            if geometry.outline(feature).len() < 3 {
                return Err(GeometryError::Degenerate(feature.name()));
            }
        }
        Ok(geometry)
    }

    pub fn outline(&self, feature: Feature) -> &[usize] {
        match feature {
            Feature::LipUpper => &self.lip_upper,
            Feature::LipLower => &self.lip_lower,
            Feature::EyebrowLeft => &self.eyebrow_left,
            Feature::EyebrowRight => &self.eyebrow_right,
            Feature::EyelinerLeft => &self.eyeliner_left,
            Feature::EyelinerRight => &self.eyeliner_right,
            Feature::EyeshadowLeft => &self.eyeshadow_left,
            Feature::EyeshadowRight => &self.eyeshadow_right,
        }
    }
}
