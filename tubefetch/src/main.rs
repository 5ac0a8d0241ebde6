mod config;
mod credentials;
mod error;
mod format;
mod handlers;
mod info;
mod job;
mod rate_limit;
mod resolver;
mod routes;
mod state;
mod stream;
#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yt_dlp::YtDlp;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tubefetch=info,yt_dlp=info,tower_http=debug".into())
        )
        .init();

    let mut config = Config::from_env();

    let mut yt_dlp = YtDlp::with_binary(&config.ytdlp_path);
    tracing::info!("Using yt-dlp binary: {}", yt_dlp.binary().display());

    // A runtime given as a path is put on PATH and passed to yt-dlp by name.
    if let Some(runtime) = config.js_runtime.clone() {
        let runtime_path = Path::new(&runtime);
        if let (Some(parent), Some(name)) = (
            runtime_path.parent().filter(|p| !p.as_os_str().is_empty()),
            runtime_path.file_name()
        ) {
            yt_dlp.set_env("PATH_PREPEND".to_string(), parent.to_string_lossy().to_string());
            config.js_runtime = Some(name.to_string_lossy().to_string());
            tracing::info!("Using JS runtime from {}", runtime);
        }
    }

    match yt_dlp.check_binary().await {
        Ok(version) => tracing::info!("yt-dlp version: {}", version),
        Err(e) => tracing::warn!("yt-dlp not found or not executable: {}", e)
    }

    if config.cookies_content.is_some() {
        tracing::info!("Cookie file content configured, it will be tried first");
    }
    tracing::info!(
        "Cookie browsers: {:?}",
        config.cookie_browsers.iter().map(|b| b.as_str()).collect::<Vec<_>>()
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(config, Arc::new(yt_dlp));
    let app = routes::router(state);

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
