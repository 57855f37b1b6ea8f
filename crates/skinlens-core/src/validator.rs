//! Face framing checks with an annotated debug frame.
//!
//! The checks run in a fixed order and the first failure wins. The debug
//! frame is diagnostic only; it never influences scoring.

use crate::types::{Landmarks, PixelBox};
use ab_glyph::{FontArc, FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;
use thiserror::Error;

const MARKER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const MARKER_RADIUS: i32 = 1;
const VERIFIED_TEXT: &str = "Face Verified";
const VERIFIED_SCALE: f32 = 32.0;
/// DejaVu Sans, used for the overlay unless another font is configured.
const BUILTIN_FONT: &[u8] = include_bytes!("../../../contrib/fonts/DejaVuSans.ttf");

const MIN_SPAN: f64 = 0.1;
const MAX_SPAN: f64 = 0.9;
const MAX_CENTER_OFFSET: f64 = 0.3;
const MIN_TOP: f64 = 0.1;
const MAX_BOTTOM: f64 = 0.9;
const MIN_ASPECT: f64 = 0.5;
const MAX_ASPECT: f64 = 2.0;

/// Why a keypoint set was not accepted as a usable face.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("No face landmarks detected")]
    NoLandmarks,
    #[error("No valid facial points found")]
    NoPoints,
    #[error("Face too small")]
    TooSmall,
    #[error("Face too large")]
    TooLarge,
    #[error("Face not centered horizontally")]
    NotCentered,
    #[error("Face position invalid vertically")]
    VerticalPosition,
    #[error("Face aspect ratio invalid")]
    AspectRatio,
}

#[derive(Error, Debug)]
pub enum ValidatorError {
    #[error("font file not readable: {path}: {source}")]
    FontRead {
        path: String,
        source: std::io::Error,
    },
    #[error("font file is not a valid TrueType/OpenType font: {0}")]
    InvalidFont(String),
}

/// Outcome of [`FaceValidator::validate`].
#[derive(Debug, Clone)]
pub struct Validation {
    pub verdict: Result<(), Rejection>,
    /// Box around all keypoints, when there were any.
    pub face_box: Option<PixelBox>,
    /// Input frame with keypoints, the face box and (on success) a verified mark.
    pub debug_frame: RgbImage,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.verdict.is_ok()
    }

    pub fn reason(&self) -> String {
        match &self.verdict {
            Ok(()) => "Face verified successfully".to_string(),
            Err(r) => r.to_string(),
        }
    }
}

/// Checks that a detected face is usably framed.
pub struct FaceValidator {
    font: Option<FontArc>,
}

impl Default for FaceValidator {
    fn default() -> Self {
        let font = match FontRef::try_from_slice(BUILTIN_FONT) {
            Ok(font) => Some(FontArc::new(font)),
            Err(e) => {
                tracing::warn!(error = %e, "built-in overlay font unreadable; verified text disabled");
                None
            }
        };
        Self { font }
    }
}

impl FaceValidator {
    /// Validator drawing the overlay with the built-in font.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_font(font: FontArc) -> Self {
        Self { font: Some(font) }
    }

    /// Load a TrueType/OpenType font to replace the built-in one.
    pub fn load_font(path: &Path) -> Result<FontArc, ValidatorError> {
        let bytes = std::fs::read(path).map_err(|source| ValidatorError::FontRead {
            path: path.display().to_string(),
            source,
        })?;
        FontArc::try_from_vec(bytes).map_err(|_| ValidatorError::InvalidFont(path.display().to_string()))
    }

    pub fn validate(&self, frame: &RgbImage, landmarks: Option<&Landmarks>) -> Validation {
        let mut debug_frame = frame.clone();

        let Some(landmarks) = landmarks else {
            return Validation { verdict: Err(Rejection::NoLandmarks), face_box: None, debug_frame };
        };

        let (w, h) = frame.dimensions();
        let points: Vec<(i32, i32)> = landmarks.iter().map(|p| p.to_pixel(w, h)).collect();
        for &center in &points {
            draw_filled_circle_mut(&mut debug_frame, center, MARKER_RADIUS, MARKER_COLOR);
        }

        let Some(face_box) = PixelBox::enclosing(&points) else {
            return Validation { verdict: Err(Rejection::NoPoints), face_box: None, debug_frame };
        };
        draw_box(&mut debug_frame, &face_box);

        let verdict = check_framing(&face_box, w, h);
        match verdict {
            Ok(()) => self.draw_verified(&mut debug_frame),
            Err(reason) => tracing::debug!(%reason, ?face_box, "face rejected"),
        }

        Validation { verdict, face_box: Some(face_box), debug_frame }
    }

    fn draw_verified(&self, frame: &mut RgbImage) {
        if let Some(font) = &self.font {
            draw_text_mut(frame, MARKER_COLOR, 10, 6, PxScale::from(VERIFIED_SCALE), font, VERIFIED_TEXT);
        }
    }
}

/// Size, centering, vertical placement and aspect checks, in that order.
fn check_framing(b: &PixelBox, width: u32, height: u32) -> Result<(), Rejection> {
    let (w, h) = (width as f64, height as f64);
    let bw = b.width() as f64;
    let bh = b.height() as f64;

    if !(bw > w * MIN_SPAN && bh > h * MIN_SPAN) {
        return Err(Rejection::TooSmall);
    }
    if !(bw < w * MAX_SPAN && bh < h * MAX_SPAN) {
        return Err(Rejection::TooLarge);
    }
    if (b.center_x() as f64 - w / 2.0).abs() >= w * MAX_CENTER_OFFSET {
        return Err(Rejection::NotCentered);
    }
    if !(b.y1 as f64 > h * MIN_TOP && (b.y2 as f64) < h * MAX_BOTTOM) {
        return Err(Rejection::VerticalPosition);
    }
    let aspect = bw / bh;
    if !(MIN_ASPECT < aspect && aspect < MAX_ASPECT) {
        return Err(Rejection::AspectRatio);
    }
    Ok(())
}

/// Two-pixel outline with inclusive corners.
fn draw_box(frame: &mut RgbImage, b: &PixelBox) {
    let (bw, bh) = (b.width() as u32, b.height() as u32);
    draw_hollow_rect_mut(frame, Rect::at(b.x1, b.y1).of_size(bw + 1, bh + 1), MARKER_COLOR);
    if bw > 1 && bh > 1 {
        draw_hollow_rect_mut(frame, Rect::at(b.x1 + 1, b.y1 + 1).of_size(bw - 1, bh - 1), MARKER_COLOR);
    }
}
