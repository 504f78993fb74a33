/// External media toolchain: yt-dlp resolves stream URLs, ffmpeg cuts the clip.
///
/// The `MediaToolchain` trait is the seam between the executor and the
/// processes it runs.
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::ToolError;
use crate::executor::process::run_tool;

/// Format preference passed to yt-dlp: separate mp4/m4a streams first,
/// then a combined mp4, then anything.
pub const FORMAT_SELECTOR: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Resolved media streams for one source video.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub title: Option<String>,
    /// Length of the source in seconds, when the extractor reports it.
    pub duration: Option<f64>,
    pub video_url: String,
    /// `None` when the video stream already carries audio.
    pub audio_url: Option<String>,
}

impl StreamInfo {
    pub fn is_combined(&self) -> bool {
        self.audio_url.is_none()
    }
}

#[async_trait]
pub trait MediaToolchain: Send + Sync {
    /// Resolve direct stream URLs and metadata for a source URL.
    async fn probe(&self, url: &str) -> Result<StreamInfo, ToolError>;

    /// Cut `[start_secs, start_secs + duration_secs)` from the streams into `output`.
    async fn trim(
        &self,
        streams: &StreamInfo,
        start_secs: u32,
        duration_secs: u32,
        output: &Path,
    ) -> Result<(), ToolError>;
}

// ====== YT-DLP OUTPUT ======

#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    duration: Option<f64>,
    url: Option<String>,
    requested_formats: Option<Vec<YtDlpFormat>>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    url: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
}

impl YtDlpFormat {
    fn has_video(&self) -> bool {
        self.vcodec.as_deref().map_or(false, |c| c != "none")
    }

    fn has_audio(&self) -> bool {
        self.acodec.as_deref().map_or(false, |c| c != "none")
    }
}

/// Pick stream URLs out of `yt-dlp -J` output.
pub fn parse_probe_output(stdout: &[u8]) -> Result<StreamInfo, ToolError> {
    let info: YtDlpInfo = serde_json::from_slice(stdout).map_err(|e| ToolError::InvalidOutput {
        tool: "yt-dlp".to_string(),
        reason: e.to_string(),
    })?;

    let formats = info.requested_formats.unwrap_or_default();
    let video = formats.iter().find(|f| f.has_video()).and_then(|f| f.url.clone());
    let audio = formats
        .iter()
        .find(|f| f.has_audio() && !f.has_video())
        .and_then(|f| f.url.clone());

    let (video_url, audio_url) = match (video, audio) {
        (Some(v), Some(a)) if v != a => (v, Some(a)),
        (Some(v), _) => (v, None),
        (None, _) => match info.url {
            Some(combined) => (combined, None),
            None => return Err(ToolError::NoStreams),
        },
    };

    Ok(StreamInfo {
        title: info.title,
        duration: info.duration,
        video_url,
        audio_url,
    })
}

/// ffmpeg arguments for a re-encoded, audio-synced cut.
pub fn trim_args(
    streams: &StreamInfo,
    start_secs: u32,
    duration_secs: u32,
    output: &Path,
) -> Vec<String> {
    let start = start_secs.to_string();
    let duration = duration_secs.to_string();

    let mut args: Vec<String> = [
        "-y",
        "-loglevel", "warning",
        "-err_detect", "ignore_err",
        "-reconnect", "1",
        "-reconnect_streamed", "1",
        "-reconnect_delay_max", "5",
        "-timeout", "30000000",
        "-user_agent", USER_AGENT,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let mut push_input = |url: &str| {
        args.extend(["-ss".to_string(), start.clone()]);
        args.extend(["-i".to_string(), url.to_string()]);
        args.extend(["-t".to_string(), duration.clone()]);
    };
    push_input(&streams.video_url);
    if let Some(audio) = &streams.audio_url {
        push_input(audio);
    }

    let audio_map = if streams.is_combined() { "0:a:0" } else { "1:a:0" };
    args.extend(
        [
            "-map", "0:v:0",
            "-map", audio_map,
            "-c:v", "libx264",
            "-preset", "fast",
            "-crf", "23",
            "-pix_fmt", "yuv420p",
            "-c:a", "aac",
            "-b:a", "128k",
            "-ac", "2",
            "-movflags", "+faststart",
            "-avoid_negative_ts", "make_zero",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push(output.to_string_lossy().to_string());
    args
}

// ====== PROCESS-BACKED TOOLCHAIN ======

/// Toolchain backed by the `yt-dlp` and `ffmpeg` executables.
pub struct CliToolchain {
    ytdlp_bin: String,
    ffmpeg_bin: String,
    proxy_url: Option<String>,
    cookies_file: Option<PathBuf>,
    probe_timeout: Duration,
    tool_timeout: Duration,
}

impl CliToolchain {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ytdlp_bin: config.ytdlp_bin.clone(),
            ffmpeg_bin: config.ffmpeg_bin.clone(),
            proxy_url: config.proxy_url.clone(),
            cookies_file: config.cookies_file.clone(),
            probe_timeout: config.probe_timeout,
            tool_timeout: config.tool_timeout,
        }
    }

    fn probe_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "-J".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "-f".to_string(),
            FORMAT_SELECTOR.to_string(),
            "--socket-timeout".to_string(),
            "30".to_string(),
            "--retries".to_string(),
            "10".to_string(),
            "--geo-bypass".to_string(),
        ];
        if let Some(proxy) = &self.proxy_url {
            args.extend(["--proxy".to_string(), proxy.clone()]);
        }
        if let Some(cookies) = self.cookies_file.as_ref().filter(|p| p.exists()) {
            info!("Using cookies file for authentication");
            args.extend(["--cookies".to_string(), cookies.to_string_lossy().to_string()]);
        }
        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl MediaToolchain for CliToolchain {
    async fn probe(&self, url: &str) -> Result<StreamInfo, ToolError> {
        let output = run_tool(&self.ytdlp_bin, &self.probe_args(url), self.probe_timeout).await?;
        let info = parse_probe_output(&output.stdout)?;
        debug!(
            "Probed {:?}: duration={:?} combined={}",
            info.title,
            info.duration,
            info.is_combined()
        );
        Ok(info)
    }

    async fn trim(
        &self,
        streams: &StreamInfo,
        start_secs: u32,
        duration_secs: u32,
        output: &Path,
    ) -> Result<(), ToolError> {
        let args = trim_args(streams, start_secs, duration_secs, output);
        run_tool(&self.ffmpeg_bin, &args, self.tool_timeout).await?;
        Ok(())
    }
}
