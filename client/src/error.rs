/// Submission error taxonomy.
///
/// Every variant ends the job with one user-facing message and a progress
/// reset; none are retried.
use thiserror::Error;

use ripedly_shared::errors::{SourceError, TimecodeError};

#[derive(Debug, Error)]
pub enum SubmitError {
    /// Bad input caught before any network call.
    #[error("{0}")]
    Validation(String),

    /// Health probe failed or the request never got a response.
    #[error("{0}")]
    Availability(String),

    /// The server answered with an error status.
    #[error("{0}")]
    Processing(String),

    /// The server claimed success but the payload is unusable.
    #[error("{0}")]
    Integrity(String),

    /// The artifact could not be written locally.
    #[error("Failed to save clip: {0}")]
    Delivery(#[from] std::io::Error),

    #[error("A clip is already being processed")]
    AlreadyPending,
}

impl From<SourceError> for SubmitError {
    fn from(e: SourceError) -> Self {
        SubmitError::Validation(e.to_string())
    }
}

impl From<TimecodeError> for SubmitError {
    fn from(e: TimecodeError) -> Self {
        SubmitError::Validation(e.to_string())
    }
}

impl SubmitError {
    pub fn kind(&self) -> &'static str {
        match self {
            SubmitError::Validation(_) => "validation",
            SubmitError::Availability(_) => "availability",
            SubmitError::Processing(_) => "processing",
            SubmitError::Integrity(_) => "integrity",
            SubmitError::Delivery(_) => "delivery",
            SubmitError::AlreadyPending => "pending",
        }
    }
}
