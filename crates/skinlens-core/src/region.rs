//! Named facial regions and their pixel-space bounding boxes.

use crate::types::{Landmarks, PixelBox};

/// A named group of face-mesh keypoints used by the skin analyzers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    LeftEye,
    RightEye,
    Forehead,
    Cheeks,
}

const LEFT_EYE: [usize; 9] = [33, 133, 157, 158, 159, 160, 161, 173, 246];
const RIGHT_EYE: [usize; 9] = [362, 263, 249, 390, 373, 374, 380, 381, 382];
const FOREHEAD: [usize; 6] = [67, 109, 10, 338, 297, 332];
const CHEEKS: [usize; 9] = [187, 411, 117, 346, 123, 147, 213, 192, 214];

impl Region {
    pub fn indices(self) -> &'static [usize] {
        match self {
            Region::LeftEye => &LEFT_EYE,
            Region::RightEye => &RIGHT_EYE,
            Region::Forehead => &FOREHEAD,
            Region::Cheeks => &CHEEKS,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Region::LeftEye => "left_eye",
            Region::RightEye => "right_eye",
            Region::Forehead => "forehead",
            Region::Cheeks => "cheeks",
        }
    }
}

/// Unclamped box around `indices`. `None` if the list is empty or any index
/// falls outside the keypoint set.
pub fn project(indices: &[usize], landmarks: &Landmarks, width: u32, height: u32) -> Option<PixelBox> {
    let points = landmarks.project(indices, width, height)?;
    PixelBox::enclosing(&points)
}

/// Box for `region`, grown by `padding` pixels and clamped to the frame.
///
/// `None` means "no data for this region": callers leave it out of their
/// aggregate statistics.
pub fn resolve(
    region: Region,
    landmarks: &Landmarks,
    width: u32,
    height: u32,
    padding: u32,
) -> Option<PixelBox> {
    project(region.indices(), landmarks, width, height)?
        .padded(padding)
        .clamped(width, height)
}
