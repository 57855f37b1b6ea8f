use anyhow::{Context, Result};
use std::net::{IpAddr, UdpSocket};
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod http;

use config::Config;
use http::{AppState, PreviewSettings};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("skinlensd starting");

    let config = Config::from_env();
    let engine = engine::spawn_engine(&config).context("failed to start engine")?;

    let state = AppState {
        engine,
        preview: PreviewSettings {
            width: config.preview_width,
            height: config.preview_height,
            quality: config.preview_quality,
        },
    };
    let app = http::router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    let host = match lan_address() {
        Some(ip) if config.bind.ip().is_unspecified() => ip.to_string(),
        _ if config.bind.ip().is_unspecified() => "localhost".to_string(),
        _ => config.bind.ip().to_string(),
    };
    tracing::info!(url = %format!("http://{host}:{}", config.bind.port()), "skinlensd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("skinlensd shutting down");
    Ok(())
}

/// Address of the interface used for outbound traffic. No packet is sent.
fn lan_address() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|a| a.ip())
}
