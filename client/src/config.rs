/// Client configuration from the environment.
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the Ripedly API, without trailing slash.
    pub api_url: String,
    /// Directory clips are saved into.
    pub output_dir: PathBuf,
    /// Overall request timeout. `None` leaves it to the transport.
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let api_url = std::env::var("RIPEDLY_API_URL")
            .unwrap_or_else(|_| "http://localhost:5000".to_string());
        let output_dir = std::env::var("RIPEDLY_OUTPUT_DIR").unwrap_or_else(|_| ".".to_string());
        let request_timeout = std::env::var("RIPEDLY_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            output_dir: PathBuf::from(output_dir),
            request_timeout,
        }
    }
}
