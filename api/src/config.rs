/// Server configuration loaded from the environment (and `.env`).
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Root for per-job working directories, also served under `/temp`.
    pub temp_dir: PathBuf,
    /// Upper bound on jobs running at once. Extra jobs are rejected, not queued.
    pub max_concurrent_jobs: usize,
    pub probe_timeout: Duration,
    pub tool_timeout: Duration,
    pub max_clip_secs: u32,
    pub ytdlp_bin: String,
    pub ffmpeg_bin: String,
    pub proxy_url: Option<String>,
    pub cookies_file: Option<PathBuf>,
    pub environment: String,
    pub enable_updater: bool,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env_or("API_HOST", "0.0.0.0"),
            port: env_parse("API_PORT", 5000),
            temp_dir: PathBuf::from(env_or("TEMP_DIR", "temp")),
            max_concurrent_jobs: env_parse("MAX_CONCURRENT_JOBS", 4),
            probe_timeout: Duration::from_secs(env_parse("PROBE_TIMEOUT_SECS", 120)),
            tool_timeout: Duration::from_secs(env_parse("TOOL_TIMEOUT_SECS", 600)),
            max_clip_secs: env_parse("MAX_CLIP_SECS", 3600),
            ytdlp_bin: env_or("YTDLP_BIN", "yt-dlp"),
            ffmpeg_bin: env_or("FFMPEG_BIN", "ffmpeg"),
            proxy_url: env_opt("PROXY_URL"),
            cookies_file: env_opt("COOKIES_FILE").map(PathBuf::from),
            environment: env_or("APP_ENV", "development"),
            enable_updater: env_parse("ENABLE_UPDATER", false),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
