/// Source URL detection for clip jobs.
///
/// The client accepts watch, short-domain, embed, shorts and `/v/` shapes
/// and extracts the 11-character video id. The API applies a looser host
/// check before handing the URL to yt-dlp.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::SourceError;

/// A recognized YouTube video reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReference {
    pub url: String,
    pub video_id: String,
}

// ====== REGEX PATTERNS ======

static YOUTUBE_VIDEO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:(?:www|m|music)\.)?(?:youtube\.com/(?:watch\?(?:[^#]*&)?v=|embed/|shorts/|v/)|youtu\.be/)([a-zA-Z0-9_-]{11})(?:[?&#/].*)?$"
    ).unwrap()
});

static YOUTUBE_HOST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:(?:www|m|music)\.)?(?:youtube\.com|youtu\.be)/.+"
    ).unwrap()
});

/// Parse a user-supplied URL into a source reference.
pub fn parse_source_url(input: &str) -> Result<SourceReference, SourceError> {
    let url = input.trim();
    if url.is_empty() {
        return Err(SourceError::Empty);
    }

    let cap = YOUTUBE_VIDEO_RE
        .captures(url)
        .ok_or_else(|| SourceError::Unrecognized(url.to_string()))?;

    Ok(SourceReference {
        url: url.to_string(),
        video_id: cap[1].to_string(),
    })
}

/// Extract only the video id, if the URL is recognized.
pub fn extract_video_id(input: &str) -> Option<String> {
    parse_source_url(input).ok().map(|s| s.video_id)
}

/// Host-level check used by the API before invoking external tools.
pub fn is_youtube_url(input: &str) -> bool {
    YOUTUBE_HOST_RE.is_match(input.trim())
}
