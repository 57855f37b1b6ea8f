use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use image::RgbImage;
use skinlens_core::{
    FaceMeshDetector, FaceValidator, LandmarkProvider, MakeupCompositor, SkinAnalyzer, StyleCatalog,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "skinlens", about = "Skinlens skin analysis and makeup preview CLI")]
struct Cli {
    /// Directory containing det_10g.onnx and face_mesh.onnx
    #[arg(long, env = "SKINLENS_MODEL_DIR", global = true)]
    model_dir: Option<PathBuf>,

    /// TOML style catalog replacing the built-in one
    #[arg(long, env = "SKINLENS_STYLES_PATH", global = true)]
    styles: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score dark circles, wrinkles and skin tone on a photo
    Analyze {
        image: PathBuf,
        /// Write the annotated validation frame here
        #[arg(long)]
        debug_out: Option<PathBuf>,
    },
    /// Apply a makeup style to a photo
    Makeup {
        image: PathBuf,
        #[arg(short, long, default_value = "natural")]
        style: String,
        #[arg(short, long)]
        out: PathBuf,
    },
    /// List available makeup styles
    Styles,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let catalog = match &cli.styles {
        Some(path) => StyleCatalog::load(path)?,
        None => StyleCatalog::builtin()?,
    };

    match cli.command {
        Commands::Analyze { image, debug_out } => {
            let frame = load_rgb(&image)?;
            let mut detector = load_detector(cli.model_dir)?;
            let landmarks = detector.detect(&frame)?;

            let validation = FaceValidator::new().validate(&frame, landmarks.as_ref());
            if let Some(path) = debug_out {
                validation
                    .debug_frame
                    .save(&path)
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }

            let Some(landmarks) = landmarks else {
                bail!("No face detected");
            };
            if let Err(reason) = validation.verdict {
                bail!("Invalid face position: {reason}");
            }

            let report = SkinAnalyzer::new().analyze(&frame, &landmarks);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Makeup { image, style, out } => {
            let Some(style) = catalog.get(&style) else {
                bail!("unknown style {style:?}; see `skinlens styles`");
            };
            let frame = load_rgb(&image)?;
            let mut detector = load_detector(cli.model_dir)?;
            let landmarks = detector.detect(&frame)?;
            if landmarks.is_none() {
                tracing::warn!("no face detected; writing the frame unchanged");
            }

            let output = MakeupCompositor::builtin()?.composite(&frame, landmarks.as_ref(), style);
            output
                .save(&out)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Wrote {}", out.display());
        }
        Commands::Styles => {
            for style in catalog.names().filter_map(|n| catalog.get(n)) {
                println!("{:<12} opacity {:.2}", style.name, style.opacity);
            }
        }
    }

    Ok(())
}

fn load_rgb(path: &Path) -> Result<RgbImage> {
    Ok(image::open(path)
        .with_context(|| format!("failed to read image {}", path.display()))?
        .to_rgb8())
}

fn load_detector(model_dir: Option<PathBuf>) -> Result<FaceMeshDetector> {
    let dir = model_dir.unwrap_or_else(skinlens_core::default_model_dir);
    let face = dir.join("det_10g.onnx");
    let mesh = dir.join("face_mesh.onnx");
    Ok(FaceMeshDetector::load(
        &face.to_string_lossy(),
        &mesh.to_string_lossy(),
        skinlens_core::detector::DEFAULT_PRESENCE_THRESHOLD,
    )?)
}
