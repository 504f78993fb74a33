/// Validation error types shared by the client and the API.
use thiserror::Error;

/// Errors produced while parsing a clip timecode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimecodeError {
    #[error("Start and end times are required")]
    Empty,

    #[error("Invalid time format. Use mm:ss or hh:mm:ss")]
    InvalidFormat(String),

    #[error("Minutes and seconds must be less than 60")]
    OutOfRange(String),
}

/// Errors produced while validating a source video URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("YouTube URL is required")]
    Empty,

    #[error("Please enter a valid YouTube URL")]
    Unrecognized(String),
}
