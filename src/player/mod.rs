//! Ordered segment playback
//!
//! Pushed audio segments land in a FIFO queue and a single drain loop plays
//! them back in arrival order. Stopping halts the backend immediately and
//! discards everything still queued.

mod backend;
mod controller;
mod queue;

pub use backend::{DeviceBackend, PlaybackBackend, AUDIO_MIME};
pub use controller::{PlaybackController, PlaybackState};
pub use queue::{AudioQueue, Segment};
