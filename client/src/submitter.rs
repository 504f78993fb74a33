/// Job submission: validate locally, probe the backend, send the trim
/// request, then verify and save the returned clip.
///
/// One job runs at a time per `Submitter`. A second `submit` while the
/// first is pending fails with `SubmitError::AlreadyPending`.
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::header::CONTENT_DISPOSITION;
use tracing::{info, warn};

use ripedly_shared::link_detector::{parse_source_url, SourceReference};
use ripedly_shared::models::{ErrorBody, TrimRequest, MIN_ARTIFACT_BYTES};
use ripedly_shared::timecode::Timecode;

use crate::config::ClientConfig;
use crate::delivery::{deliver, resolve_filename};
use crate::error::SubmitError;
use crate::progress::{ProgressSchedule, ProgressSink, ProgressTracker};

const BACKEND_UNAVAILABLE: &str = "Backend unavailable";
const CONNECT_FAILED: &str = "Failed to connect to server";
const GENERIC_FAILURE: &str = "Failed to process video";
const INVALID_ARTIFACT: &str = "Downloaded file appears to be invalid or too small";
const TIMES_REQUIRED: &str = "Start and end times are required";
const DOWNLOAD_COMPLETE: &str = "Download complete!";

/// A clip saved on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredArtifact {
    pub path: PathBuf,
    pub filename: String,
    pub size: usize,
}

pub struct Submitter {
    http: reqwest::Client,
    api_url: String,
    output_dir: PathBuf,
    sink: Arc<dyn ProgressSink>,
    schedule: ProgressSchedule,
    pending: AtomicBool,
}

/// Clears the pending flag when the job ends, however it ends.
struct PendingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> PendingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl Submitter {
    pub fn new(config: &ClientConfig, sink: Arc<dyn ProgressSink>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            api_url: config.api_url.clone(),
            output_dir: config.output_dir.clone(),
            sink,
            schedule: ProgressSchedule::default(),
            pending: AtomicBool::new(false),
        })
    }

    pub fn with_schedule(mut self, schedule: ProgressSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Submit one clip job and save the result into the output directory.
    pub async fn submit(
        &self,
        url: &str,
        start: &str,
        end: &str,
    ) -> Result<DeliveredArtifact, SubmitError> {
        if start.trim().is_empty() || end.trim().is_empty() {
            return Err(SubmitError::Validation(TIMES_REQUIRED.to_string()));
        }
        let source = parse_source_url(url)?;
        let start = Timecode::parse(start)?;
        let end = Timecode::parse(end)?;

        let _guard = PendingGuard::acquire(&self.pending).ok_or(SubmitError::AlreadyPending)?;

        let tracker = ProgressTracker::new(self.sink.clone());
        let result = self.run(&source, &start, &end, &tracker).await;

        match &result {
            Ok(artifact) => {
                info!("Saved {} ({} bytes)", artifact.path.display(), artifact.size);
                tracker.complete(DOWNLOAD_COMPLETE);
            }
            Err(e) => {
                warn!(kind = e.kind(), "Clip job failed: {}", e);
                tracker.fail(&e.to_string());
            }
        }
        result
    }

    async fn run(
        &self,
        source: &SourceReference,
        start: &Timecode,
        end: &Timecode,
        tracker: &ProgressTracker,
    ) -> Result<DeliveredArtifact, SubmitError> {
        self.check_health().await?;

        let request = TrimRequest::new(source.url.as_str(), start.as_str(), end.as_str());
        info!(video_id = %source.video_id, "Submitting clip {} -> {}", start, end);

        let timers = tracker.start(&self.schedule);
        let sent = self
            .http
            .post(self.endpoint("/api/trim"))
            .json(&request)
            .send()
            .await;
        timers.cancel();

        let response = sent.map_err(|e| {
            warn!("Trim request failed: {}", e);
            SubmitError::Availability(CONNECT_FAILED.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = parse_error_body(&body).unwrap_or_else(|| {
                warn!(%status, "Unreadable error body from server");
                GENERIC_FAILURE.to_string()
            });
            return Err(SubmitError::Processing(message));
        }

        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let bytes = response.bytes().await.map_err(|e| {
            warn!("Reading clip body failed: {}", e);
            SubmitError::Availability(CONNECT_FAILED.to_string())
        })?;

        if (bytes.len() as u64) < MIN_ARTIFACT_BYTES {
            return Err(SubmitError::Integrity(INVALID_ARTIFACT.to_string()));
        }

        let filename = resolve_filename(disposition.as_deref(), start, end);
        let size = bytes.len();
        let dir = self.output_dir.clone();
        let name = filename.clone();
        let path = tokio::task::spawn_blocking(move || deliver(&bytes, &dir, &name))
            .await
            .map_err(std::io::Error::other)??;

        Ok(DeliveredArtifact {
            path,
            filename,
            size,
        })
    }

    async fn check_health(&self) -> Result<(), SubmitError> {
        match self.http.get(self.endpoint("/api/health")).send().await {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => {
                warn!("Health check returned {}", response.status());
                Err(SubmitError::Availability(BACKEND_UNAVAILABLE.to_string()))
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
                Err(SubmitError::Availability(BACKEND_UNAVAILABLE.to_string()))
            }
        }
    }
}

/// The `error` field of a JSON error body, if there is a non-empty one.
pub fn parse_error_body(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error)
        .filter(|m| !m.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::progress::testing::{Event, RecordingSink};
    use crate::progress::ProgressStep;

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    fn quick_schedule() -> ProgressSchedule {
        ProgressSchedule::new(vec![
            ProgressStep::new(Duration::ZERO, 10, "Connecting to server..."),
            ProgressStep::new(Duration::from_millis(5), 25, "Fetching video information..."),
            ProgressStep::new(Duration::from_millis(10), 40, "Downloading and trimming video..."),
            ProgressStep::new(Duration::from_millis(40), 60, "Still processing..."),
            ProgressStep::new(Duration::from_millis(400), 75, "Almost done..."),
        ])
    }

    fn submitter(api_url: &str, out: &std::path::Path) -> (Submitter, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let config = ClientConfig {
            api_url: api_url.to_string(),
            output_dir: out.to_path_buf(),
            request_timeout: None,
        };
        let submitter = Submitter::new(&config, sink.clone())
            .unwrap()
            .with_schedule(quick_schedule());
        (submitter, sink)
    }

    async fn healthy_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK"
            })))
            .mount(&server)
            .await;
        server
    }

    fn clip(len: usize) -> Vec<u8> {
        vec![0u8; len]
    }

    #[tokio::test]
    async fn test_saves_clip_with_server_filename() {
        let server = healthy_server().await;
        Mock::given(method("POST"))
            .and(path("/api/trim"))
            .and(body_json(serde_json::json!({
                "url": URL,
                "startTime": "00:30",
                "endTime": "01:30"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-disposition", r#"attachment; filename="clip.mp4""#)
                    .set_body_bytes(clip(4096)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let out = tempfile::tempdir().unwrap();
        let (submitter, sink) = submitter(&server.uri(), out.path());

        let artifact = submitter.submit(URL, "00:30", "01:30").await.unwrap();

        assert_eq!(artifact.filename, "clip.mp4");
        assert_eq!(artifact.size, 4096);
        assert_eq!(std::fs::read(out.path().join("clip.mp4")).unwrap().len(), 4096);
        assert_eq!(sink.events().last(), Some(&Event::Reset));
        assert!(sink.statuses().contains(&DOWNLOAD_COMPLETE.to_string()));
        assert!(!submitter.is_pending());
    }

    #[tokio::test]
    async fn test_synthesizes_filename_without_header() {
        let server = healthy_server().await;
        Mock::given(method("POST"))
            .and(path("/api/trim"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(clip(2048)))
            .mount(&server)
            .await;

        let out = tempfile::tempdir().unwrap();
        let (submitter, _sink) = submitter(&server.uri(), out.path());

        let artifact = submitter.submit(URL, "00:30", "01:30").await.unwrap();

        assert_eq!(artifact.filename, "Ripedly_00_30_to_01_30.mp4");
        assert!(out.path().join("Ripedly_00_30_to_01_30.mp4").exists());
    }

    #[tokio::test]
    async fn test_validation_makes_no_requests() {
        let server = healthy_server().await;
        let out = tempfile::tempdir().unwrap();
        let (submitter, sink) = submitter(&server.uri(), out.path());

        let cases = [
            ("https://vimeo.com/123", "00:10", "00:20", "Please enter a valid YouTube URL"),
            (URL, "", "00:20", "Start and end times are required"),
            (URL, "00:10", "  ", "Start and end times are required"),
            (URL, "1:2:3", "00:20", "Invalid time format. Use mm:ss or hh:mm:ss"),
            (URL, "00:10", "abc", "Invalid time format. Use mm:ss or hh:mm:ss"),
        ];
        for (url, start, end, message) in cases {
            let err = submitter.submit(url, start, end).await.unwrap_err();
            assert!(matches!(err, SubmitError::Validation(_)), "{url} {start} {end}");
            assert_eq!(err.to_string(), message);
        }

        assert!(server.received_requests().await.unwrap().is_empty());
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_unhealthy_backend_never_trims() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/trim"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(clip(2048)))
            .expect(0)
            .mount(&server)
            .await;

        let out = tempfile::tempdir().unwrap();
        let (submitter, sink) = submitter(&server.uri(), out.path());

        let err = submitter.submit(URL, "00:10", "00:20").await.unwrap_err();

        assert!(matches!(err, SubmitError::Availability(_)));
        assert_eq!(err.to_string(), "Backend unavailable");
        assert_eq!(sink.events(), vec![Event::Reset]);
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let out = tempfile::tempdir().unwrap();
        let (submitter, _sink) = submitter(&uri, out.path());

        let err = submitter.submit(URL, "00:10", "00:20").await.unwrap_err();
        assert_eq!(err.to_string(), "Backend unavailable");
    }

    #[tokio::test]
    async fn test_server_error_message_is_surfaced() {
        let server = healthy_server().await;
        Mock::given(method("POST"))
            .and(path("/api/trim"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "End time exceeds video duration (212s)"
            })))
            .mount(&server)
            .await;

        let out = tempfile::tempdir().unwrap();
        let (submitter, sink) = submitter(&server.uri(), out.path());

        let err = submitter.submit(URL, "00:10", "59:00").await.unwrap_err();

        assert!(matches!(err, SubmitError::Processing(_)));
        assert_eq!(err.to_string(), "End time exceeds video duration (212s)");
        assert_eq!(sink.events().last(), Some(&Event::Reset));
    }

    #[tokio::test]
    async fn test_unreadable_error_body_falls_back() {
        let server = healthy_server().await;
        Mock::given(method("POST"))
            .and(path("/api/trim"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
            .mount(&server)
            .await;

        let out = tempfile::tempdir().unwrap();
        let (submitter, _sink) = submitter(&server.uri(), out.path());

        let err = submitter.submit(URL, "00:10", "00:20").await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to process video");
    }

    #[tokio::test]
    async fn test_tiny_artifact_is_rejected_and_not_saved() {
        let server = healthy_server().await;
        Mock::given(method("POST"))
            .and(path("/api/trim"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(clip(10)))
            .mount(&server)
            .await;

        let out = tempfile::tempdir().unwrap();
        let (submitter, _sink) = submitter(&server.uri(), out.path());

        let err = submitter.submit(URL, "00:10", "00:20").await.unwrap_err();

        assert!(matches!(err, SubmitError::Integrity(_)));
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_slow_job_escalates_then_stops() {
        let server = healthy_server().await;
        Mock::given(method("POST"))
            .and(path("/api/trim"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(clip(2048))
                    .set_delay(Duration::from_millis(60)),
            )
            .mount(&server)
            .await;

        let out = tempfile::tempdir().unwrap();
        let (submitter, sink) = submitter(&server.uri(), out.path());

        submitter.submit(URL, "00:10", "00:20").await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let statuses = sink.statuses();
        assert!(statuses.contains(&"Still processing...".to_string()));
        assert!(!statuses.contains(&"Almost done...".to_string()));
        assert_eq!(statuses.last().map(String::as_str), Some(DOWNLOAD_COMPLETE));
        assert_eq!(sink.events().last(), Some(&Event::Reset));

        let percents = sink.percents();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_second_submit_while_pending() {
        let server = healthy_server().await;
        Mock::given(method("POST"))
            .and(path("/api/trim"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(clip(2048))
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let out = tempfile::tempdir().unwrap();
        let (submitter, _sink) = submitter(&server.uri(), out.path());

        let (first, second) = tokio::join!(
            submitter.submit(URL, "00:10", "00:20"),
            submitter.submit(URL, "00:30", "00:40"),
        );

        assert!(first.is_ok());
        assert!(matches!(second, Err(SubmitError::AlreadyPending)));
        assert!(!submitter.is_pending());

        // the flag is released, so a follow-up job may start
        let err = submitter.submit("not a url", "00:10", "00:20").await.unwrap_err();
        assert!(matches!(err, SubmitError::Validation(_)));
    }

    #[test]
    fn test_parse_error_body() {
        assert_eq!(
            parse_error_body(r#"{"error":"Invalid YouTube URL"}"#),
            Some("Invalid YouTube URL".to_string())
        );
        assert_eq!(parse_error_body(r#"{"error":""}"#), None);
        assert_eq!(parse_error_body(r#"{"message":"x"}"#), None);
        assert_eq!(parse_error_body("not json"), None);
    }
}
