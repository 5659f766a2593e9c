//! Push-channel consumption
//!
//! The server emits a one-way SSE stream of named events (`connected`,
//! `heartbeat`, `audio`). This module parses the wire format and keeps the
//! connection alive across transport failures.

mod client;
mod sse;

pub use client::{ConnectionState, EventStreamClient, StreamEvent, StreamHandle};
pub use sse::{SseEvent, SseParser};
