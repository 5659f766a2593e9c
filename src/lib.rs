//! Cadence Player - voice-interruptible client for server-pushed audio streams
//!
//! This library provides the core functionality of the player:
//! - Push-channel (SSE) consumption with automatic reconnection
//! - Ordered playback of pushed audio segments through a single drain loop
//! - A continuously-listening speech recognizer that survives a host engine
//!   which silently terminates sessions
//! - Routing of finalized utterances to playback control (stop phrase)
//!
//! # Architecture
//!
//! ```text
//! server ──SSE──▶ EventStreamClient ──▶ AudioQueue ──▶ PlaybackController ──▶ speakers
//!
//! microphone ──▶ SpeechRecognizer ──▶ VoiceCommandBridge ──▶ PlaybackController::stop
//! ```

pub mod config;
pub mod daemon;
pub mod error;
pub mod player;
pub mod stream;
pub mod voice;

pub use config::{Config, SttConfig, VoiceConfig};
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use player::{
    AudioQueue, DeviceBackend, PlaybackBackend, PlaybackController, PlaybackState, Segment,
};
pub use stream::{ConnectionState, EventStreamClient, SseEvent, StreamEvent, StreamHandle};
pub use voice::{
    CommandAction, HttpSttBackend, RecognizerConfig, RecognizerHandle, RecognizerState,
    SessionConfig, SessionErrorKind, SessionEvent, SpeechBackend, SpeechRecognizer, SpeechSession,
    VoiceCommandBridge,
};
