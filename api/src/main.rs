/// Ripedly API Server
///
/// Accepts clip jobs (YouTube URL + time range), cuts them with
/// yt-dlp/ffmpeg and streams the resulting mp4 back in the same response.
mod config;
mod error;
mod executor;
mod routes;
mod updater;

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use config::Config;
use executor::toolchain::CliToolchain;
use executor::Executor;

/// Shared application state for all API handlers.
pub struct AppState {
    pub config: Config,
    pub executor: Executor,
    /// Installed yt-dlp version, refreshed by the updater.
    pub tool_version: RwLock<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ripedly_api=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env();
    std::fs::create_dir_all(&config.temp_dir)?;
    info!("Temp directory: {}", config.temp_dir.display());
    info!(
        "Job slots: {}, tool timeout: {}s",
        config.max_concurrent_jobs,
        config.tool_timeout.as_secs()
    );

    let version = updater::detect_version(&config.ytdlp_bin).await;
    info!("Current yt-dlp version: {}", version);

    let toolchain = Arc::new(CliToolchain::from_config(&config));
    let executor = Executor::new(
        toolchain,
        config.max_concurrent_jobs,
        config.temp_dir.clone(),
        config.max_clip_secs,
    );

    let state = Arc::new(AppState {
        config,
        executor,
        tool_version: RwLock::new(version),
    });

    if state.config.enable_updater {
        info!("yt-dlp updater enabled");
        updater::spawn(state.clone());
    }

    let app = routes::router(state.clone());

    // Bind
    let addr = state.config.bind_addr();
    info!("Ripedly API listening on {} ({})", addr, state.config.environment);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Ripedly API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
