use image::RgbImage;
use skinlens_core::features::GeometryError;
use skinlens_core::{
    AnalysisReport, CatalogError, DetectorError, FaceMeshDetector, FaceValidator, LandmarkProvider, MakeupCompositor,
    Rejection, SkinAnalyzer, StyleCatalog,
};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::config::Config;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("style catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("feature geometry error: {0}")]
    Geometry(#[from] GeometryError),
    #[error("unknown style: {0}")]
    UnknownStyle(String),
    #[error("frame processing panicked: {0}")]
    Panicked(String),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Result of a skin analysis request.
pub enum AnalysisOutcome {
    /// The detector found no face.
    NoFace,
    /// A face was found but is badly framed.
    Rejected { reason: Rejection, debug_frame: RgbImage },
    /// The face passed validation and was scored.
    Report { report: AnalysisReport, debug_frame: RgbImage },
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Analyze {
        frame: RgbImage,
        reply: oneshot::Sender<Result<AnalysisOutcome, EngineError>>,
    },
    Composite {
        frame: RgbImage,
        reply: oneshot::Sender<Result<RgbImage, EngineError>>,
    },
    ChangeStyle {
        name: String,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    ActiveStyle {
        reply: oneshot::Sender<String>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    styles: Arc<[String]>,
}

impl EngineHandle {
    /// Detect, validate and score one frame.
    pub async fn analyze(&self, frame: RgbImage) -> Result<AnalysisOutcome, EngineError> {
        self.request(|reply| EngineRequest::Analyze { frame, reply }).await?
    }

    /// Apply the active style's makeup to one frame.
    pub async fn composite(&self, frame: RgbImage) -> Result<RgbImage, EngineError> {
        self.request(|reply| EngineRequest::Composite { frame, reply }).await?
    }

    /// Switch the active style. Ordered with frames already queued.
    pub async fn change_style(&self, name: impl Into<String>) -> Result<(), EngineError> {
        let name = name.into();
        self.request(|reply| EngineRequest::ChangeStyle { name, reply }).await?
    }

    pub async fn active_style(&self) -> Result<String, EngineError> {
        self.request(|reply| EngineRequest::ActiveStyle { reply }).await
    }

    /// Catalog style names, in catalog order.
    pub fn style_names(&self) -> &[String] {
        &self.styles
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> EngineRequest) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(make(reply_tx)).await.map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Everything the pipeline touches, owned by the engine thread.
pub struct Engine {
    provider: Box<dyn LandmarkProvider + Send>,
    validator: FaceValidator,
    analyzer: SkinAnalyzer,
    compositor: MakeupCompositor,
    catalog: StyleCatalog,
    active_style: String,
}

impl Engine {
    /// Assemble an engine; fails if `default_style` is not in the catalog.
    pub fn new(
        provider: Box<dyn LandmarkProvider + Send>,
        validator: FaceValidator,
        compositor: MakeupCompositor,
        catalog: StyleCatalog,
        default_style: &str,
    ) -> Result<Self, EngineError> {
        let active_style = catalog.default_style(default_style)?.name.clone();
        Ok(Self {
            provider,
            validator,
            analyzer: SkinAnalyzer::new(),
            compositor,
            catalog,
            active_style,
        })
    }

    fn analyze(&mut self, frame: &RgbImage) -> Result<AnalysisOutcome, EngineError> {
        let Some(landmarks) = self.provider.detect(frame)? else {
            return Ok(AnalysisOutcome::NoFace);
        };

        let validation = self.validator.validate(frame, Some(&landmarks));
        if let Err(reason) = validation.verdict {
            return Ok(AnalysisOutcome::Rejected {
                reason,
                debug_frame: validation.debug_frame,
            });
        }

        let report = self.analyzer.analyze(frame, &landmarks);
        Ok(AnalysisOutcome::Report {
            report,
            debug_frame: validation.debug_frame,
        })
    }

    fn composite(&mut self, frame: &RgbImage) -> Result<RgbImage, EngineError> {
        let landmarks = self.provider.detect(frame)?;
        let style = self
            .catalog
            .get(&self.active_style)
            .ok_or_else(|| EngineError::UnknownStyle(self.active_style.clone()))?;
        Ok(self.compositor.composite(frame, landmarks.as_ref(), style))
    }

    fn change_style(&mut self, name: String) -> Result<(), EngineError> {
        if !self.catalog.contains(&name) {
            return Err(EngineError::UnknownStyle(name));
        }
        if self.active_style != name {
            tracing::info!(from = %self.active_style, to = %name, "style changed");
            self.active_style = name;
        }
        Ok(())
    }

    fn handle(&mut self, req: EngineRequest) {
        match req {
            EngineRequest::Analyze { frame, reply } => {
                let started = Instant::now();
                let result = guarded(|| self.analyze(&frame));
                tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "analyze done");
                let _ = reply.send(result);
            }
            EngineRequest::Composite { frame, reply } => {
                let started = Instant::now();
                let result = guarded(|| self.composite(&frame));
                tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "composite done");
                let _ = reply.send(result);
            }
            EngineRequest::ChangeStyle { name, reply } => {
                let _ = reply.send(self.change_style(name));
            }
            EngineRequest::ActiveStyle { reply } => {
                let _ = reply.send(self.active_style.clone());
            }
        }
    }
}

/// Run one pipeline step; a panic becomes an error instead of killing the thread.
fn guarded<T>(f: impl FnOnce() -> Result<T, EngineError>) -> Result<T, EngineError> {
    std::panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!(panic = %msg, "frame processing panicked");
        Err(EngineError::Panicked(msg))
    })
}

/// Spawn the engine on a dedicated OS thread.
///
/// Loads the face detector and face-mesh models, the style catalog and an
/// optional replacement overlay font, then enters a request loop. Fails fast
/// at startup if a model or the catalog is unavailable.
pub fn spawn_engine(config: &Config) -> Result<EngineHandle, EngineError> {
    let face_path = config.face_detector_model_path();
    let mesh_path = config.face_mesh_model_path();
    let detector = FaceMeshDetector::load(&face_path, &mesh_path, config.presence_threshold)?;
    tracing::info!(
        face = %face_path,
        mesh = %mesh_path,
        threshold = config.presence_threshold,
        "landmark pipeline loaded"
    );

    let catalog = match &config.styles_path {
        Some(path) => StyleCatalog::load(path)?,
        None => StyleCatalog::builtin()?,
    };

    let validator = match &config.font_path {
        Some(path) => match FaceValidator::load_font(path) {
            Ok(font) => FaceValidator::with_font(font),
            Err(e) => {
                tracing::warn!(error = %e, "overlay font unavailable; using built-in font");
                FaceValidator::new()
            }
        },
        None => FaceValidator::new(),
    };

    let engine = Engine::new(
        Box::new(detector),
        validator,
        MakeupCompositor::builtin()?,
        catalog,
        &config.default_style,
    )?;
    spawn_engine_with(engine, config.queue_depth)
}

/// Spawn an already-assembled engine.
pub fn spawn_engine_with(mut engine: Engine, queue_depth: usize) -> Result<EngineHandle, EngineError> {
    let styles: Arc<[String]> = engine.catalog.names().map(str::to_string).collect();
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(queue_depth.max(1));

    std::thread::Builder::new()
        .name("skinlens-engine".into())
        .spawn(move || {
            tracing::info!(style = %engine.active_style, "engine thread started");
            while let Some(req) = rx.blocking_recv() {
                engine.handle(req);
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx, styles })
}
