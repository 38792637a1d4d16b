//! Error types for event playback

use thiserror::Error;

/// Playback errors
///
/// These are usage errors: they are returned synchronously from the call
/// that caused them and never alter player state. Malformed items are not
/// errors in this sense; they are reported through
/// [`PlayerEvent::Error`](crate::PlayerEvent::Error) while the run continues.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// `load` was called during an active run
    #[error("Cannot load items while playing back events")]
    LoadWhilePlaying,

    /// `start` was called before any items were loaded
    #[error("No items to play back; call load first")]
    NotLoaded,

    /// The delay cap was not a number
    #[error("Max delay must be a number, got {0}")]
    InvalidMaxDelay(String),

    /// Items were not supplied as an array
    #[error("Items must be an array, got {0}")]
    InvalidItems(String),

    /// `start` was called outside a Tokio runtime
    #[error("Playback requires a Tokio runtime")]
    NoRuntime,

    /// `start` was called on a runtime built without `enable_time`
    #[error("Playback requires a Tokio runtime with timers enabled")]
    TimersDisabled,

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
