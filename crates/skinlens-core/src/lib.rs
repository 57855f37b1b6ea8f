//! skinlens-core — Facial skin scoring and virtual makeup.
//!
//! Landmarks come from an SCRFD face detector and a MediaPipe face-mesh
//! model run on the face crop, both via ONNX Runtime.
//! Everything downstream of detection (framing checks, region scoring,
//! makeup compositing) is pure image arithmetic on `image` buffers.

pub mod dark_circles;
pub mod detector;
pub mod face_detector;
pub mod features;
pub mod imaging;
mod letterbox;
pub mod makeup;
pub mod metrics;
pub mod region;
pub mod skin_tone;
pub mod style;
pub mod types;
pub mod validator;
pub mod wrinkles;

pub use detector::{default_model_dir, DetectorError, FaceMeshDetector, LandmarkProvider};
pub use face_detector::{FaceBox, FaceDetector};
pub use makeup::MakeupCompositor;
pub use metrics::{SkinAnalyzer, SkinMetric};
pub use style::{CatalogError, MakeupStyle, StyleCatalog};
pub use types::{AnalysisReport, Keypoint, Landmarks, MetricResult, PixelBox, Severity};
pub use validator::{FaceValidator, Rejection, Validation};
