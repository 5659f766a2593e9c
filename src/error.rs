//! Error types for the Cadence player

use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the player
#[derive(Debug, Error)]
pub enum Error {
    /// Push-channel transport error (recovered by timed reconnect)
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed segment payload (segment dropped, queue continues)
    #[error("decode error: {0}")]
    Decode(String),

    /// Playback backend failure on a segment (segment dropped, loop continues)
    #[error("playback error: {0}")]
    Playback(String),

    /// Play-trigger request failed (reported to caller, no retry)
    #[error("trigger request error: {0}")]
    Trigger(String),

    /// Speech recognition error
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),
}
