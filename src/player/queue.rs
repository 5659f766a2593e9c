//! FIFO queue of pending audio segments
//!
//! Each segment's payload is a decoded audio resource that must be released
//! exactly once: after it finishes playing, or when the queue is flushed.
//! Removal from the queue IS the release, so a double release is
//! unrepresentable; the cumulative release count stays observable for
//! diagnostics and tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use base64::Engine as _;

use crate::{Error, Result};

/// One decoded unit of audio delivered by the server
#[derive(Debug, Clone)]
pub struct Segment {
    payload: Arc<Vec<u8>>,
    handle: u64,
}

impl Segment {
    /// Decoded audio bytes
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Queue-assigned resource id
    #[must_use]
    pub const fn handle(&self) -> u64 {
        self.handle
    }
}

#[derive(Debug, Default)]
struct Inner {
    segments: VecDeque<Segment>,
    next_handle: u64,
    released: u64,
}

/// Ordered buffer of pending playable segments
///
/// Clones share the same underlying queue.
#[derive(Debug, Clone, Default)]
pub struct AudioQueue {
    inner: Arc<Mutex<Inner>>,
}

impl AudioQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a base64 payload and append it as a new tail segment
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for malformed or empty payloads. The queue
    /// itself is unaffected by the failure.
    pub fn enqueue(&self, raw: &str) -> Result<Segment> {
        let payload = base64::engine::general_purpose::STANDARD
            .decode(raw.trim())
            .map_err(|e| Error::Decode(e.to_string()))?;
        if payload.is_empty() {
            return Err(Error::Decode("empty segment payload".to_string()));
        }

        let mut inner = self.inner.lock().expect("queue lock poisoned");
        let segment = Segment {
            payload: Arc::new(payload),
            handle: inner.next_handle,
        };
        inner.next_handle += 1;
        inner.segments.push_back(segment.clone());

        tracing::debug!(
            handle = segment.handle,
            bytes = segment.payload.len(),
            queue_len = inner.segments.len(),
            "segment enqueued"
        );
        Ok(segment)
    }

    /// The head segment, without removing it
    ///
    /// The returned value shares the payload with the queued segment, so the
    /// head stays observable as the active segment while it plays.
    #[must_use]
    pub fn peek_head(&self) -> Option<Segment> {
        self.inner
            .lock()
            .expect("queue lock poisoned")
            .segments
            .front()
            .cloned()
    }

    /// Remove and release the head segment
    ///
    /// Call exactly once per segment, after it finished playing, errored, or
    /// was skipped.
    pub fn pop_head(&self) -> Option<Segment> {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        let segment = inner.segments.pop_front();
        if let Some(s) = &segment {
            inner.released += 1;
            tracing::debug!(
                handle = s.handle,
                queue_len = inner.segments.len(),
                "segment released"
            );
        }
        segment
    }

    /// Release and clear every queued segment
    ///
    /// Returns the number of segments discarded.
    pub fn flush(&self) -> usize {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        let discarded = inner.segments.len();
        inner.released += discarded as u64;
        inner.segments.clear();
        if discarded > 0 {
            tracing::debug!(discarded, "queue flushed");
        }
        discarded
    }

    /// Number of segments awaiting or currently in playback
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue lock poisoned").segments.len()
    }

    /// Whether the queue holds no segments
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cumulative count of segments released since creation
    #[must_use]
    pub fn released(&self) -> u64 {
        self.inner.lock().expect("queue lock poisoned").released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_decodes_and_appends_in_order() {
        let queue = AudioQueue::new();
        queue.enqueue("AAAA").unwrap();
        queue.enqueue("BBBB").unwrap();

        assert_eq!(queue.len(), 2);
        let head = queue.peek_head().unwrap();
        assert_eq!(head.handle(), 0);
        assert_eq!(head.payload(), &[0, 0, 0]);
    }

    #[test]
    fn malformed_payload_leaves_queue_intact() {
        let queue = AudioQueue::new();
        queue.enqueue("AAAA").unwrap();
        assert!(matches!(queue.enqueue("not base64!!"), Err(Error::Decode(_))));
        assert!(matches!(queue.enqueue(""), Err(Error::Decode(_))));

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.released(), 0);
    }

    #[test]
    fn pop_releases_exactly_once() {
        let queue = AudioQueue::new();
        queue.enqueue("AAAA").unwrap();

        assert!(queue.pop_head().is_some());
        assert!(queue.pop_head().is_none());
        assert_eq!(queue.released(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn flush_releases_everything() {
        let queue = AudioQueue::new();
        queue.enqueue("AAAA").unwrap();
        queue.enqueue("BBBB").unwrap();
        queue.enqueue("CCCC").unwrap();

        assert_eq!(queue.flush(), 3);
        assert_eq!(queue.released(), 3);
        assert!(queue.is_empty());
        // Flushing an empty queue is a no-op
        assert_eq!(queue.flush(), 0);
        assert_eq!(queue.released(), 3);
    }
}
