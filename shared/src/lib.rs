/// Shared types for Ripedly.
///
/// Wire models, the timecode grammar and the source URL grammar used by
/// both the API and the terminal client.
pub mod errors;
pub mod link_detector;
pub mod models;
pub mod timecode;
