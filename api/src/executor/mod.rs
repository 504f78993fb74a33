/// Clip job executor.
///
/// Validates a trim request, runs the media toolchain in an isolated
/// workspace and hands back a streamable artifact. Every failure leaves
/// as an `ApiError`; the workspace is removed on all paths.
pub mod process;
pub mod toolchain;
pub mod workspace;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use ripedly_shared::link_detector::is_youtube_url;
use ripedly_shared::models::{clip_filename, TrimRequest, MIN_ARTIFACT_BYTES};
use ripedly_shared::timecode::Timecode;

use crate::error::{ApiError, ToolError};
use toolchain::MediaToolchain;
use workspace::{Artifact, ArtifactReader, JobWorkspace};

/// A trim request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipJob {
    pub url: String,
    pub start: Timecode,
    pub end: Timecode,
    pub start_secs: u32,
    pub end_secs: u32,
}

impl ClipJob {
    pub fn duration_secs(&self) -> u32 {
        self.end_secs - self.start_secs
    }

    pub fn filename(&self) -> String {
        clip_filename(&self.start, &self.end)
    }

    /// Validate request shape, URL, timecodes and range.
    pub fn from_request(request: &TrimRequest, max_clip_secs: u32) -> Result<Self, ApiError> {
        if request.has_missing_fields() {
            return Err(ApiError::bad_request("Missing required parameters"));
        }

        let url = request.url.trim();
        if !is_youtube_url(url) {
            return Err(ApiError::bad_request("Invalid YouTube URL"));
        }

        let invalid_time = |_| ApiError::bad_request("Invalid time format. Use mm:ss or hh:mm:ss");
        let start = Timecode::parse(&request.start_time).map_err(invalid_time)?;
        let end = Timecode::parse(&request.end_time).map_err(invalid_time)?;
        let start_secs = start.to_seconds().map_err(invalid_time)?;
        let end_secs = end.to_seconds().map_err(invalid_time)?;

        if end_secs <= start_secs {
            return Err(ApiError::bad_request("End time must be after start time"));
        }
        if end_secs - start_secs > max_clip_secs {
            return Err(ApiError::bad_request(format!(
                "Maximum duration is {}",
                describe_limit(max_clip_secs)
            )));
        }

        Ok(Self {
            url: url.to_string(),
            start,
            end,
            start_secs,
            end_secs,
        })
    }
}

fn describe_limit(secs: u32) -> String {
    match secs {
        3600 => "1 hour".to_string(),
        s if s % 60 == 0 => format!("{} minutes", s / 60),
        s => format!("{} seconds", s),
    }
}

/// Runs clip jobs against a toolchain, bounded by a fixed number of slots.
pub struct Executor {
    toolchain: Arc<dyn MediaToolchain>,
    slots: Arc<Semaphore>,
    temp_dir: PathBuf,
    max_clip_secs: u32,
}

impl Executor {
    pub fn new(
        toolchain: Arc<dyn MediaToolchain>,
        max_concurrent: usize,
        temp_dir: PathBuf,
        max_clip_secs: u32,
    ) -> Self {
        Self {
            toolchain,
            slots: Arc::new(Semaphore::new(max_concurrent)),
            temp_dir,
            max_clip_secs,
        }
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Execute one trim request end to end.
    pub async fn execute(&self, request: &TrimRequest) -> Result<Artifact, ApiError> {
        let job = ClipJob::from_request(request, self.max_clip_secs)?;

        let permit = self.slots.clone().try_acquire_owned().map_err(|_| {
            warn!("Rejecting job for {}: all slots busy", job.url);
            ApiError::Busy
        })?;

        let workspace = JobWorkspace::create(&self.temp_dir).map_err(|e| {
            error!("Failed to create job workspace: {}", e);
            ApiError::internal("Failed to prepare working directory")
        })?;

        info!(
            "Trimming {} from {}s to {}s in {}",
            job.url,
            job.start_secs,
            job.end_secs,
            workspace.path().display()
        );

        let streams = self.toolchain.probe(&job.url).await.map_err(|e| {
            error!("Failed to get video/audio URLs: {}", e);
            match e {
                ToolError::NoStreams => ApiError::processing("Could not extract suitable streams"),
                _ => ApiError::from_tool(&e, "Failed to extract stream URLs"),
            }
        })?;

        if let Some(duration) = streams.duration {
            if f64::from(job.end_secs) > duration {
                return Err(ApiError::bad_request(format!(
                    "End time exceeds video duration ({}s)",
                    duration.round() as u64
                )));
            }
        }

        let filename = job.filename();
        let output = workspace.file(&filename);

        self.toolchain
            .trim(&streams, job.start_secs, job.duration_secs(), &output)
            .await
            .map_err(|e| {
                error!("Error trimming video: {}", e);
                ApiError::from_tool(&e, "Failed to trim video")
            })?;

        let size = match tokio::fs::metadata(&output).await {
            Ok(meta) if meta.len() >= MIN_ARTIFACT_BYTES => meta.len(),
            Ok(meta) => {
                error!("Output file is too small ({} bytes)", meta.len());
                return Err(ApiError::processing("Generated video file is invalid"));
            }
            Err(e) => {
                error!("Output file is missing: {}", e);
                return Err(ApiError::processing("Generated video file is invalid"));
            }
        };

        let reader = ArtifactReader::open(workspace, &output, permit)
            .await
            .map_err(|e| {
                error!("Failed to open artifact {}: {}", output.display(), e);
                ApiError::internal("Failed to read generated video")
            })?;

        info!("Trimmed {} ({} bytes)", filename, size);
        Ok(Artifact {
            filename,
            size,
            reader,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeToolchain, Outcome};
    use super::*;
    use axum::http::StatusCode;
    use tokio::io::AsyncReadExt;

    fn request(start: &str, end: &str) -> TrimRequest {
        TrimRequest::new("https://www.youtube.com/watch?v=dQw4w9WgXcQ", start, end)
    }

    fn executor(fake: Arc<FakeToolchain>, root: &std::path::Path, slots: usize) -> Executor {
        Executor::new(fake, slots, root.to_path_buf(), 3600)
    }

    fn job_dirs(root: &std::path::Path) -> usize {
        std::fs::read_dir(root).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn test_clip_job_validation() {
        let job = ClipJob::from_request(&request("00:30", "01:30"), 3600).unwrap();
        assert_eq!(job.start_secs, 30);
        assert_eq!(job.duration_secs(), 60);
        assert_eq!(job.filename(), "Ripedly_00_30_to_01_30.mp4");

        let cases = [
            (TrimRequest::default(), "Missing required parameters"),
            (TrimRequest::new("https://vimeo.com/1", "00:00", "00:10"), "Invalid YouTube URL"),
            (request("1:2:3:4", "00:10"), "Invalid time format. Use mm:ss or hh:mm:ss"),
            (request("00:75", "01:10"), "Invalid time format. Use mm:ss or hh:mm:ss"),
            (request("01:30", "00:30"), "End time must be after start time"),
            (request("00:30", "00:30"), "End time must be after start time"),
            (request("0:00:00", "1:00:01"), "Maximum duration is 1 hour"),
        ];
        for (req, message) in cases {
            let err = ClipJob::from_request(&req, 3600).unwrap_err();
            assert_eq!(err.to_string(), message, "{req:?}");
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_success_streams_artifact_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeToolchain::writing(4096));
        let exec = executor(fake.clone(), root.path(), 2);

        let mut artifact = exec.execute(&request("00:30", "01:30")).await.unwrap();
        assert_eq!(artifact.filename, "Ripedly_00_30_to_01_30.mp4");
        assert_eq!(artifact.size, 4096);
        assert_eq!(exec.available_slots(), 1);
        assert_eq!(job_dirs(root.path()), 1);

        let mut bytes = Vec::new();
        artifact.reader.read_to_end(&mut bytes).await.unwrap();
        assert_eq!(bytes.len(), 4096);

        drop(artifact);
        assert_eq!(job_dirs(root.path()), 0);
        assert_eq!(exec.available_slots(), 2);
    }

    #[tokio::test]
    async fn test_undersized_output_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let exec = executor(Arc::new(FakeToolchain::writing(10)), root.path(), 1);

        let err = exec.execute(&request("00:00", "00:10")).await.unwrap_err();
        assert_eq!(err.to_string(), "Generated video file is invalid");
        assert_eq!(job_dirs(root.path()), 0);
        assert_eq!(exec.available_slots(), 1);
    }

    #[tokio::test]
    async fn test_tool_failures_map_to_json_errors() {
        let root = tempfile::tempdir().unwrap();

        let mut fake = FakeToolchain::writing(0);
        fake.probe_fails = true;
        let exec = executor(Arc::new(fake), root.path(), 1);
        let err = exec.execute(&request("00:00", "00:10")).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to extract stream URLs");

        let mut fake = FakeToolchain::writing(0);
        fake.outcome = Outcome::Fail;
        let exec = executor(Arc::new(fake), root.path(), 1);
        let err = exec.execute(&request("00:00", "00:10")).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to trim video");

        let mut fake = FakeToolchain::writing(0);
        fake.outcome = Outcome::Timeout;
        let exec = executor(Arc::new(fake), root.path(), 1);
        let err = exec.execute(&request("00:00", "00:10")).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);

        assert_eq!(job_dirs(root.path()), 0);
    }

    #[tokio::test]
    async fn test_end_past_video_duration() {
        let root = tempfile::tempdir().unwrap();
        let mut fake = FakeToolchain::writing(4096);
        fake.duration = Some(45.0);
        let fake = Arc::new(fake);
        let exec = executor(fake.clone(), root.path(), 1);

        let err = exec.execute(&request("00:30", "01:00")).await.unwrap_err();
        assert_eq!(err.to_string(), "End time exceeds video duration (45s)");
        assert_eq!(fake.trims.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_busy_when_no_slots() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeToolchain::writing(4096));
        let exec = executor(fake.clone(), root.path(), 1);

        let held = exec.execute(&request("00:00", "00:10")).await.unwrap();
        let err = exec.execute(&request("00:00", "00:10")).await.unwrap_err();
        assert!(matches!(err, ApiError::Busy));
        drop(held);

        assert!(exec.execute(&request("00:00", "00:10")).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_toolchain() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeToolchain::writing(4096));
        let exec = executor(fake.clone(), root.path(), 1);

        let _ = exec.execute(&request("abc", "00:10")).await.unwrap_err();
        assert_eq!(fake.calls(), 0);
    }
}
