/// yt-dlp version detection and the optional background self-updater.
///
/// YouTube changes break older extractors regularly, so the server can
/// check GitHub for a newer yt-dlp release every hour and run `yt-dlp -U`.
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::USER_AGENT;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::executor::process::run_tool;
use crate::AppState;

pub const RELEASES_URL: &str = "https://api.github.com/repos/yt-dlp/yt-dlp/releases/latest";

const UNKNOWN_VERSION: &str = "unknown";
const FIRST_CHECK_DELAY: Duration = Duration::from_secs(10);
const CHECK_INTERVAL: Duration = Duration::from_secs(3600);
const ERROR_BACKOFF: Duration = Duration::from_secs(300);
const UPDATE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

/// Installed yt-dlp version, or `"unknown"` if it cannot be determined.
pub async fn detect_version(ytdlp_bin: &str) -> String {
    match run_tool(ytdlp_bin, &["--version".to_string()], Duration::from_secs(10)).await {
        Ok(output) => {
            let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if version.is_empty() {
                UNKNOWN_VERSION.to_string()
            } else {
                version
            }
        }
        Err(e) => {
            warn!("Error getting yt-dlp version: {}", e);
            UNKNOWN_VERSION.to_string()
        }
    }
}

fn version_parts(version: &str) -> Option<Vec<u64>> {
    version
        .trim()
        .trim_start_matches('v')
        .split('.')
        .map(|p| p.parse().ok())
        .collect()
}

/// Whether `latest` is newer than `current`.
///
/// Dotted numeric versions compare component-wise. If either side is not
/// numeric, any difference counts as an update. An unknown current version
/// never triggers one.
pub fn needs_update(current: &str, latest: &str) -> bool {
    if current == UNKNOWN_VERSION || current.is_empty() || latest.is_empty() {
        return false;
    }
    match (version_parts(current), version_parts(latest)) {
        (Some(cur), Some(new)) => new > cur,
        _ => latest.trim() != current.trim(),
    }
}

/// Tag name of the latest release published at `url`.
pub async fn latest_release(client: &reqwest::Client, url: &str) -> Result<String, reqwest::Error> {
    let release: Release = client
        .get(url)
        .header(USER_AGENT, "ripedly-api")
        .timeout(Duration::from_secs(30))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(release.tag_name)
}

/// One check cycle. Returns whether an update was installed.
async fn check_and_update(state: &AppState, client: &reqwest::Client) -> anyhow::Result<bool> {
    let latest = latest_release(client, RELEASES_URL).await?;
    let current = state.tool_version.read().await.clone();

    if !needs_update(&current, &latest) {
        info!("yt-dlp is up to date ({})", current);
        return Ok(false);
    }

    info!("Updating yt-dlp: {} -> {}", current, latest);
    run_tool(&state.config.ytdlp_bin, &["-U".to_string()], UPDATE_TIMEOUT).await?;

    let installed = detect_version(&state.config.ytdlp_bin).await;
    info!("yt-dlp updated to {}", installed);
    *state.tool_version.write().await = installed;
    Ok(true)
}

/// Start the hourly update loop.
pub fn spawn(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(FIRST_CHECK_DELAY).await;
        let client = reqwest::Client::new();
        loop {
            let wait = match check_and_update(&state, &client).await {
                Ok(_) => CHECK_INTERVAL,
                Err(e) => {
                    warn!("yt-dlp update check failed: {}", e);
                    ERROR_BACKOFF
                }
            };
            tokio::time::sleep(wait).await;
        }
    })
}
