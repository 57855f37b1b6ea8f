//! Two-stage face landmarks via ONNX Runtime.
//!
//! SCRFD finds the face, the crop around it is letterboxed into the
//! MediaPipe face-mesh model, and the 468 mesh points are mapped back to
//! normalized frame coordinates. Only the most confident face is reported.

use crate::face_detector::{FaceBox, FaceDetector};
use crate::imaging;
use crate::letterbox::{letterbox_tensor, Letterbox};
use crate::types::{Keypoint, Landmarks, PixelBox, FACE_MESH_POINTS};
use image::RgbImage;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::{Path, PathBuf};
use thiserror::Error;

const MESH_INPUT_SIZE: u32 = 192;
const MESH_LANDMARK_VALUES: usize = FACE_MESH_POINTS * 3;
/// Side of the square mesh crop relative to the longer side of the face box.
const FACE_CROP_SCALE: f32 = 1.5;
/// Default sigmoid(face-presence logit) cut-off.
pub const DEFAULT_PRESENCE_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — place det_10g.onnx and face_mesh.onnx in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Maps an RGB frame to at most one face's keypoints.
///
/// Takes `&mut self`: inference sessions are not re-entrant, so a provider is
/// owned by exactly one thread.
pub trait LandmarkProvider {
    fn detect(&mut self, frame: &RgbImage) -> Result<Option<Landmarks>, DetectorError>;
}

/// Directory searched for model files when none is configured.
pub fn default_model_dir() -> PathBuf {
    PathBuf::from("/usr/share/skinlens/models")
}

/// Face detector followed by the face-mesh landmark model.
pub struct FaceMeshDetector {
    faces: FaceDetector,
    session: Session,
    num_outputs: usize,
    presence_threshold: f32,
}

impl FaceMeshDetector {
    /// Load the SCRFD detector and the face-mesh model.
    pub fn load(face_model_path: &str, mesh_model_path: &str, presence_threshold: f32) -> Result<Self, DetectorError> {
        if !Path::new(mesh_model_path).exists() {
            return Err(DetectorError::ModelNotFound(mesh_model_path.to_string()));
        }
        let faces = FaceDetector::load(face_model_path)?;

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(mesh_model_path)?;

        let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        tracing::info!(
            path = mesh_model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded face mesh model"
        );

        if output_names.is_empty() {
            return Err(DetectorError::InferenceFailed("face mesh model has no outputs".into()));
        }

        Ok(Self {
            faces,
            session,
            num_outputs: output_names.len(),
            presence_threshold,
        })
    }
}

impl LandmarkProvider for FaceMeshDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Option<Landmarks>, DetectorError> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Ok(None);
        }

        let faces = self.faces.detect(frame)?;
        let Some(crop_box) = faces.first().and_then(|f| face_crop(f, width, height)) else {
            tracing::debug!("no face box in frame");
            return Ok(None);
        };

        let crop = imaging::crop(frame, &crop_box);
        let (input, letterbox) = letterbox_tensor(&crop, MESH_INPUT_SIZE, -1.0, |v| v as f32 / 127.5 - 1.0);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        // Exports differ in naming; tell the tensors apart by size instead.
        let mut mesh: Option<Vec<f32>> = None;
        let mut presence_logit: Option<f32> = None;
        for idx in 0..self.num_outputs {
            let (_, data) = outputs[idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("output {idx}: {e}")))?;
            if data.len() >= MESH_LANDMARK_VALUES && mesh.is_none() {
                mesh = Some(data[..MESH_LANDMARK_VALUES].to_vec());
            } else if data.len() == 1 && presence_logit.is_none() {
                presence_logit = Some(data[0]);
            }
        }

        let mesh = mesh.ok_or_else(|| {
            DetectorError::InferenceFailed(format!("no output holds {MESH_LANDMARK_VALUES} landmark values"))
        })?;

        if let Some(logit) = presence_logit {
            let presence = sigmoid(logit);
            if presence < self.presence_threshold {
                tracing::debug!(presence, threshold = self.presence_threshold, "mesh rejected face crop");
                return Ok(None);
            }
        }

        Ok(Some(decode_mesh(&mesh, &letterbox, &crop_box, width, height)))
    }
}

/// Square crop centered on the face box, clamped to the frame.
fn face_crop(face: &FaceBox, width: u32, height: u32) -> Option<PixelBox> {
    let side = face.width.max(face.height) * FACE_CROP_SCALE;
    let cx = face.x + face.width / 2.0;
    let cy = face.y + face.height / 2.0;
    PixelBox {
        x1: (cx - side / 2.0).round() as i32,
        y1: (cy - side / 2.0).round() as i32,
        x2: (cx + side / 2.0).round() as i32,
        y2: (cy + side / 2.0).round() as i32,
    }
    .clamped(width, height)
}

/// `[x, y, z]` triples in mesh-input pixels → normalized frame keypoints.
fn decode_mesh(mesh: &[f32], letterbox: &Letterbox, crop: &PixelBox, width: u32, height: u32) -> Landmarks {
    Landmarks::new(
        mesh.chunks_exact(3)
            .map(|p| {
                let (x, y) = letterbox.to_source(p[0], p[1]);
                Keypoint::new(
                    (crop.x1 as f32 + x) / width as f32,
                    (crop.y1 as f32 + y) / height as f32,
                )
            })
            .collect(),
    )
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_model() {
        let err = FaceMeshDetector::load("/nonexistent/det_10g.onnx", "/nonexistent/face_mesh.onnx", 0.5)
            .err()
            .unwrap();
        assert!(matches!(err, DetectorError::ModelNotFound(_)));
    }

    #[test]
    fn test_face_crop_is_square_with_margin() {
        let face = FaceBox { x: 200.0, y: 120.0, width: 80.0, height: 100.0, confidence: 0.9 };
        let b = face_crop(&face, 480, 360).unwrap();
        // Side 150 around center (240, 170).
        assert_eq!(b, PixelBox { x1: 165, y1: 95, x2: 315, y2: 245 });
    }

    #[test]
    fn test_face_crop_clamps_to_frame() {
        let face = FaceBox { x: -20.0, y: 300.0, width: 100.0, height: 100.0, confidence: 0.9 };
        let b = face_crop(&face, 480, 360).unwrap();
        assert_eq!((b.x1, b.y2), (0, 360));
        assert!(face_crop(&FaceBox { x: 600.0, y: 10.0, width: 10.0, height: 10.0, confidence: 0.9 }, 480, 360).is_none());
    }

    #[test]
    fn test_decode_mesh_maps_crop_to_frame() {
        // 150×150 crop at (165, 95) in a 480×360 frame: scale 1.28, no padding.
        let crop = PixelBox { x1: 165, y1: 95, x2: 315, y2: 245 };
        let lb = Letterbox::fit(150, 150, MESH_INPUT_SIZE);
        let mut mesh = vec![0.0f32; MESH_LANDMARK_VALUES];
        // Crop center in mesh-input pixels.
        mesh[0] = 96.0;
        mesh[1] = 96.0;
        let lm = decode_mesh(&mesh, &lb, &crop, 480, 360);
        assert_eq!(lm.len(), FACE_MESH_POINTS);
        let p = lm.get(0).unwrap();
        assert!((p.x * 480.0 - 240.0).abs() < 0.01, "x: {}", p.x * 480.0);
        assert!((p.y * 360.0 - 170.0).abs() < 0.01, "y: {}", p.y * 360.0);
        // Mesh origin lands on the crop corner.
        let q = lm.get(1).unwrap();
        assert!((q.x * 480.0 - 165.0).abs() < 0.01 && (q.y * 360.0 - 95.0).abs() < 0.01);
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }
}
