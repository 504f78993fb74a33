/// Estimated progress for a pending clip job.
///
/// The server reports nothing while it works, so progress is fabricated
/// on a fixed schedule measured from the moment the request is sent. The
/// schedule runs as a spawned task owned by `ProgressTimers`; once the
/// tracker is closed no further estimate reaches the sink, even if a timer
/// wakes up late.
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

/// One published progress value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressEstimate {
    pub percent: u8,
    pub status: String,
}

/// Receiver of progress estimates (a terminal line, a test recorder...).
pub trait ProgressSink: Send + Sync {
    fn update(&self, estimate: &ProgressEstimate);

    /// Progress went back to zero because the job ended.
    fn reset(&self);
}

/// A scheduled estimate, `after` measured from submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressStep {
    pub after: Duration,
    pub percent: u8,
    pub status: String,
}

impl ProgressStep {
    pub fn new(after: Duration, percent: u8, status: impl Into<String>) -> Self {
        Self {
            after,
            percent,
            status: status.into(),
        }
    }
}

/// Ordered list of scheduled estimates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSchedule {
    steps: Vec<ProgressStep>,
}

impl ProgressSchedule {
    pub fn new(mut steps: Vec<ProgressStep>) -> Self {
        steps.sort_by_key(|s| s.after);
        Self { steps }
    }

    /// Initial walk spaced by `step_interval`, then the two slow-job
    /// escalations at 10s and 25s.
    pub fn standard(step_interval: Duration) -> Self {
        Self::new(vec![
            ProgressStep::new(Duration::ZERO, 10, "Connecting to server..."),
            ProgressStep::new(step_interval, 25, "Fetching video information..."),
            ProgressStep::new(step_interval * 2, 40, "Downloading and trimming video..."),
            ProgressStep::new(
                Duration::from_secs(10),
                60,
                "Still processing... longer clips take more time",
            ),
            ProgressStep::new(
                Duration::from_secs(25),
                75,
                "Almost done... finalizing your clip",
            ),
        ])
    }

    pub fn steps(&self) -> &[ProgressStep] {
        &self.steps
    }
}

impl Default for ProgressSchedule {
    fn default() -> Self {
        Self::standard(Duration::from_millis(800))
    }
}

struct TrackerState {
    current: ProgressEstimate,
    /// Job finished; nothing publishes any more.
    closed: bool,
    /// Schedule cancelled; only `complete`/`fail` may publish.
    halted: bool,
}

/// Progress state of a single job.
#[derive(Clone)]
pub struct ProgressTracker {
    state: Arc<Mutex<TrackerState>>,
    sink: Arc<dyn ProgressSink>,
}

impl ProgressTracker {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackerState {
                current: ProgressEstimate::default(),
                closed: false,
                halted: false,
            })),
            sink,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        // state is plain data, a poisoned lock still holds a usable value
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn current(&self) -> ProgressEstimate {
        self.lock().current.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Publish a new estimate. Percent never goes down and is capped at 100.
    /// Returns false once the tracker is closed or its schedule cancelled.
    pub fn advance(&self, percent: u8, status: &str) -> bool {
        let mut state = self.lock();
        if state.closed || state.halted {
            return false;
        }
        let percent = percent.min(100).max(state.current.percent);
        state.current = ProgressEstimate {
            percent,
            status: status.to_string(),
        };
        self.sink.update(&state.current);
        true
    }

    /// Stop scheduled estimates. Taken under the same lock as `advance`, so
    /// a timer already running when this returns cannot publish.
    fn halt(&self) {
        self.lock().halted = true;
    }

    /// Start the schedule. Drop or `cancel` the returned handle to stop it.
    pub fn start(&self, schedule: &ProgressSchedule) -> ProgressTimers {
        let tracker = self.clone();
        let steps = schedule.steps.clone();
        let started = Instant::now();

        let handle = tokio::spawn(async move {
            for step in steps {
                tokio::time::sleep_until(started + step.after).await;
                if !tracker.advance(step.percent, &step.status) {
                    break;
                }
            }
        });

        ProgressTimers {
            handle: Some(handle),
            tracker: self.clone(),
        }
    }

    /// Job succeeded: show 100%, then reset and close.
    pub fn complete(&self, status: &str) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        state.current = ProgressEstimate {
            percent: 100,
            status: status.to_string(),
        };
        self.sink.update(&state.current);
        state.current = ProgressEstimate::default();
        self.sink.reset();
    }

    /// Job failed: reset to 0 carrying the error message, and close.
    pub fn fail(&self, message: &str) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        state.current = ProgressEstimate {
            percent: 0,
            status: message.to_string(),
        };
        self.sink.reset();
    }
}

/// Handle to a running schedule. Aborts it on `cancel` or drop.
pub struct ProgressTimers {
    handle: Option<JoinHandle<()>>,
    tracker: ProgressTracker,
}

impl ProgressTimers {
    pub fn cancel(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.tracker.halt();
            handle.abort();
        }
    }
}

impl Drop for ProgressTimers {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Single-line progress display on stderr.
pub struct TerminalProgress;

impl ProgressSink for TerminalProgress {
    fn update(&self, estimate: &ProgressEstimate) {
        let mut err = std::io::stderr().lock();
        let _ = write!(err, "\r[{:>3}%] {:<60}", estimate.percent, estimate.status);
        let _ = err.flush();
    }

    fn reset(&self) {
        eprintln!();
    }
}
