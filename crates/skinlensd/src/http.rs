//! HTTP surface: skin analysis, live makeup preview and style selection.

use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use serde_json::json;
use skinlens_core::AnalysisReport;
use thiserror::Error;

use crate::engine::{AnalysisOutcome, EngineError, EngineHandle};

const INDEX_HTML: &str = include_str!("../assets/index.html");
const DEBUG_JPEG_QUALITY: u8 = 95;
const NO_CACHE: &str = "no-store, no-cache, must-revalidate, max-age=0";

/// Settings for `/process_frame` output.
#[derive(Debug, Clone, Copy)]
pub struct PreviewSettings {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub preview: PreviewSettings,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/styles", get(styles))
        .route("/analyze_skin", post(analyze_skin))
        .route("/process_frame", post(process_frame))
        .route("/change_style", post(change_style))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// JSON errors from `/analyze_skin`.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or undecodable upload.
    #[error("{0}")]
    Input(String),
    #[error("No face detected")]
    NoFace,
    #[error("Invalid face position")]
    InvalidFace { reason: String, debug_image: String },
    #[error("{0}")]
    Processing(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Input(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::NoFace => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "No face detected",
                    "message": "Please ensure your face is clearly visible",
                }),
            ),
            ApiError::InvalidFace { reason, debug_image } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "Invalid face position",
                    "message": reason,
                    "debug_image": debug_image,
                }),
            ),
            ApiError::Processing(msg) => {
                tracing::error!(error = %msg, "skin analysis failed");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg }))
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Processing(e.to_string())
    }
}

/// Plain-text errors from `/process_frame`.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("No frame uploaded")]
    NoFrame,
    #[error("Invalid image data")]
    BadFrame,
    #[error("Error processing frame")]
    Processing(#[source] anyhow::Error),
}

impl IntoResponse for FrameError {
    fn into_response(self) -> Response {
        let status = match &self {
            FrameError::NoFrame | FrameError::BadFrame => StatusCode::BAD_REQUEST,
            FrameError::Processing(e) => {
                tracing::error!(error = %e, "frame processing failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

/// Report plus the fields the browser UI expects alongside it.
#[derive(Serialize)]
struct AnalysisResponse {
    #[serde(flatten)]
    report: AnalysisReport,
    face_position: &'static str,
    debug_image: String,
}

#[derive(Deserialize)]
struct ChangeStyleRequest {
    style: Option<String>,
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn styles(State(state): State<AppState>) -> Response {
    match state.engine.active_style().await {
        Ok(active) => Json(json!({ "styles": state.engine.style_names(), "active": active })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "style listing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

async fn change_style(State(state): State<AppState>, body: Result<Json<ChangeStyleRequest>, JsonRejection>) -> Response {
    let style = match body {
        Ok(Json(req)) => req.style,
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "bad change_style body");
            return style_error(StatusCode::BAD_REQUEST, &rejection.body_text());
        }
    };
    let Some(style) = style else {
        return style_error(StatusCode::BAD_REQUEST, "Invalid style");
    };

    match state.engine.change_style(style).await {
        Ok(()) => Json(json!({ "status": "success" })).into_response(),
        Err(EngineError::UnknownStyle(name)) => {
            tracing::debug!(style = %name, "rejected unknown style");
            style_error(StatusCode::BAD_REQUEST, "Invalid style")
        }
        Err(e) => {
            tracing::error!(error = %e, "style change failed");
            style_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

fn style_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "status": "error", "message": message }))).into_response()
}

async fn analyze_skin(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let bytes = match multipart {
        Ok(mut m) => frame_field(&mut m)
            .await
            .map_err(|e| ApiError::Input(e.body_text()))?,
        Err(_) => None,
    };
    let bytes = bytes.ok_or_else(|| ApiError::Input("No frame uploaded".into()))?;

    let frame = blocking(move || decode_frame(&bytes))
        .await
        .map_err(|e| ApiError::Processing(e.to_string()))?
        .ok_or_else(|| ApiError::Input("Invalid image data".into()))?;

    match state.engine.analyze(frame).await? {
        AnalysisOutcome::NoFace => {
            tracing::debug!("analyze: no face");
            Err(ApiError::NoFace)
        }
        AnalysisOutcome::Rejected { reason, debug_frame } => {
            tracing::debug!(%reason, "analyze: face rejected");
            let debug_image = debug_data_uri(debug_frame).await?;
            Err(ApiError::InvalidFace {
                reason: reason.to_string(),
                debug_image,
            })
        }
        AnalysisOutcome::Report { report, debug_frame } => {
            let debug_image = debug_data_uri(debug_frame).await?;
            Ok(Json(AnalysisResponse {
                report,
                face_position: "valid",
                debug_image,
            }))
        }
    }
}

async fn process_frame(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, FrameError> {
    let bytes = match multipart {
        Ok(mut m) => frame_field(&mut m).await.map_err(|_| FrameError::NoFrame)?,
        Err(_) => None,
    };
    let bytes = bytes.ok_or(FrameError::NoFrame)?;

    let PreviewSettings { width, height, quality } = state.preview;
    let frame = blocking(move || {
        decode_frame(&bytes).map(|f| image::imageops::resize(&f, width, height, FilterType::Triangle))
    })
    .await
    .map_err(FrameError::Processing)?
    .ok_or(FrameError::BadFrame)?;

    let output = state
        .engine
        .composite(frame)
        .await
        .map_err(|e| FrameError::Processing(e.into()))?;

    let jpeg = blocking(move || encode_jpeg(&output, quality))
        .await
        .and_then(|r| r.map_err(Into::into))
        .map_err(FrameError::Processing)?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, NO_CACHE),
            (header::PRAGMA, "no-cache"),
        ],
        jpeg,
    )
        .into_response())
}

/// Bytes of the first multipart field named `frame`.
async fn frame_field(multipart: &mut Multipart) -> Result<Option<Bytes>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("frame") {
            return field.bytes().await.map(Some);
        }
    }
    Ok(None)
}

/// Any format `image` recognises, converted to RGB. `None` if undecodable.
fn decode_frame(bytes: &[u8]) -> Option<RgbImage> {
    match image::load_from_memory(bytes) {
        Ok(img) => Some(img.to_rgb8()),
        Err(e) => {
            tracing::debug!(error = %e, len = bytes.len(), "upload is not a decodable image");
            None
        }
    }
}

fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode_image(img)?;
    Ok(buf)
}

async fn debug_data_uri(debug_frame: RgbImage) -> Result<String, ApiError> {
    let jpeg = blocking(move || encode_jpeg(&debug_frame, DEBUG_JPEG_QUALITY))
        .await
        .map_err(|e| ApiError::Processing(e.to_string()))?
        .map_err(|e| ApiError::Processing(e.to_string()))?;
    Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg)))
}

/// Codec work off the async workers.
async fn blocking<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> anyhow::Result<T> {
    Ok(tokio::task::spawn_blocking(f).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::{centered_face, engine_with, test_frame};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use skinlens_core::{Keypoint, Landmarks};
    use std::io::Cursor;
    use tower::ServiceExt;

    const BOUNDARY: &str = "skinlens-test-boundary";

    fn app(landmarks: Option<Landmarks>) -> Router {
        let state = AppState {
            engine: engine_with(landmarks),
            preview: PreviewSettings { width: 480, height: 360, quality: 70 },
        };
        router(state, 8 * 1024 * 1024)
    }

    fn png(img: &RgbImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn upload(uri: &str, field: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"frame.png\"\r\n\
             Content-Type: image/png\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Request::post(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn style_request(body: &str) -> Request<Body> {
        Request::post("/change_style")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_index() {
        let resp = app(None).oneshot(Request::get("/").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(std::str::from_utf8(&body).unwrap().contains("<html"));
    }

    #[tokio::test]
    async fn test_analyze_missing_frame() {
        let resp = app(None).oneshot(upload("/analyze_skin", "image", b"x")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await, json!({ "error": "No frame uploaded" }));
    }

    #[tokio::test]
    async fn test_analyze_not_multipart() {
        let req = Request::post("/analyze_skin").body(Body::empty()).unwrap();
        let resp = app(None).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_analyze_undecodable() {
        let resp = app(None).oneshot(upload("/analyze_skin", "frame", b"not an image")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"], "Invalid image data");
    }

    #[tokio::test]
    async fn test_analyze_no_face() {
        let resp = app(None).oneshot(upload("/analyze_skin", "frame", &png(&test_frame()))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = json_body(resp).await;
        assert_eq!(body["error"], "No face detected");
        assert_eq!(body["message"], "Please ensure your face is clearly visible");
    }

    #[tokio::test]
    async fn test_analyze_invalid_face() {
        let tiny = Landmarks::new(vec![Keypoint::new(0.5, 0.5), Keypoint::new(0.52, 0.52)]);
        let resp = app(Some(tiny)).oneshot(upload("/analyze_skin", "frame", &png(&test_frame()))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = json_body(resp).await;
        assert_eq!(body["error"], "Invalid face position");
        assert_eq!(body["message"], "Face too small");
        assert!(body["debug_image"].as_str().unwrap().starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_analyze_report() {
        let resp = app(Some(centered_face()))
            .oneshot(upload("/analyze_skin", "frame", &png(&test_frame())))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["face_position"], "valid");
        for key in ["dark_circles", "wrinkles", "skin_tone"] {
            assert!(body[key]["score"].is_f64(), "{key}");
            let severity = body[key]["severity"].as_str().unwrap();
            assert!(["Excellent", "Good", "Fair", "Needs Improvement"].contains(&severity));
        }
        assert!(body["overall_score"].is_number());
        assert!(body["debug_image"].as_str().unwrap().starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_process_frame_missing_frame() {
        let resp = app(None).oneshot(upload("/process_frame", "other", b"x")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"No frame uploaded");
    }

    #[tokio::test]
    async fn test_process_frame_returns_uncached_jpeg() {
        let resp = app(Some(centered_face()))
            .oneshot(upload("/process_frame", "frame", &png(&test_frame())))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/jpeg");
        assert_eq!(resp.headers()[header::CACHE_CONTROL], NO_CACHE);
        assert_eq!(resp.headers()[header::PRAGMA], "no-cache");
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let img = image::load_from_memory(&body).unwrap();
        assert_eq!((img.width(), img.height()), (480, 360));
    }

    #[tokio::test]
    async fn test_concurrent_process_frame_identical() {
        let app = app(Some(centered_face()));
        let frame = png(&test_frame());
        let mut tasks = Vec::new();
        for _ in 0..6 {
            let app = app.clone();
            let req = upload("/process_frame", "frame", &frame);
            tasks.push(tokio::spawn(async move {
                let resp = app.oneshot(req).await.unwrap();
                to_bytes(resp.into_body(), usize::MAX).await.unwrap()
            }));
        }
        let mut outputs = Vec::new();
        for t in tasks {
            outputs.push(t.await.unwrap());
        }
        assert!(outputs.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn test_change_style_is_idempotent() {
        let app = app(Some(centered_face()));
        let frame = png(&test_frame());

        for _ in 0..2 {
            let resp = app.clone().oneshot(style_request(r#"{"style":"sweet"}"#)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(json_body(resp).await, json!({ "status": "success" }));
        }
        let a = app.clone().oneshot(upload("/process_frame", "frame", &frame)).await.unwrap();
        let a = to_bytes(a.into_body(), usize::MAX).await.unwrap();

        let resp = app.clone().oneshot(style_request(r#"{"style":"sweet"}"#)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let b = app.clone().oneshot(upload("/process_frame", "frame", &frame)).await.unwrap();
        let b = to_bytes(b.into_body(), usize::MAX).await.unwrap();
        assert_eq!(a, b);

        let resp = app.oneshot(Request::get("/styles").body(Body::empty()).unwrap()).await.unwrap();
        let body = json_body(resp).await;
        assert_eq!(body["active"], "sweet");
        assert_eq!(body["styles"], json!(["natural", "dramatic", "sweet", "party"]));
    }

    #[tokio::test]
    async fn test_change_style_invalid() {
        let app = app(None);
        for body in [r#"{"style":"gothic"}"#, r#"{"style":"Natural"}"#, "{}"] {
            let resp = app.clone().oneshot(style_request(body)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(json_body(resp).await, json!({ "status": "error", "message": "Invalid style" }));
        }
    }

    #[tokio::test]
    async fn test_change_style_malformed_body() {
        let resp = app(None).oneshot(style_request("style=natural")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["status"], "error");
    }
}
