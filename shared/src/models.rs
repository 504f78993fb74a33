/// Wire types exchanged between the Ripedly client and API.
use serde::{Deserialize, Serialize};

use crate::timecode::Timecode;

/// Prefix of every synthesized clip filename.
pub const ARTIFACT_PREFIX: &str = "Ripedly";

/// Smallest artifact, in bytes, that either side accepts as a real video.
pub const MIN_ARTIFACT_BYTES: u64 = 1000;

/// Body of `POST /api/trim`.
///
/// Missing fields deserialize to empty strings so the API can report
/// them as missing parameters instead of a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrimRequest {
    pub url: String,
    pub start_time: String,
    pub end_time: String,
}

impl TrimRequest {
    pub fn new(
        url: impl Into<String>,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            start_time: start_time.into(),
            end_time: end_time.into(),
        }
    }

    /// Whether any of the three fields is blank.
    pub fn has_missing_fields(&self) -> bool {
        self.url.trim().is_empty()
            || self.start_time.trim().is_empty()
            || self.end_time.trim().is_empty()
    }
}

/// JSON error body returned on every non-2xx API response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Body of `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub timestamp: String,
    pub yt_dlp_version: String,
    pub environment: String,
    pub server: String,
}

/// Body of `GET /api/test-connection`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionTestResponse {
    pub status: String,
    pub message: String,
    pub timestamp: String,
    pub server_type: String,
}

/// Filename for a clip cut between two timecodes,
/// e.g. `Ripedly_00_30_to_01_30.mp4`.
pub fn clip_filename(start: &Timecode, end: &Timecode) -> String {
    format!(
        "{}_{}_to_{}.mp4",
        ARTIFACT_PREFIX,
        start.file_safe(),
        end.file_safe()
    )
}
