//! Playback controller
//!
//! Drains the segment queue sequentially through the playback backend.
//! Exactly one drain loop runs at a time: starting is an atomic Idle→Playing
//! transition on the state channel, so rapid enqueue bursts cannot spawn
//! duplicates. Stops are tracked with an epoch counter; a drain only releases
//! segments belonging to its own epoch, which keeps a late-unwinding loop
//! from touching segments enqueued after the stop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::player::backend::{PlaybackBackend, AUDIO_MIME};
use crate::player::queue::AudioQueue;
use crate::{Error, Result};

/// Observable playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No drain loop active
    Idle,
    /// A drain loop is consuming the queue
    Playing,
}

/// Callback invoked after a stop completes
pub type StopCallback = Arc<dyn Fn() + Send + Sync>;

/// Drains the audio queue and exposes play/stop control
#[derive(Clone)]
pub struct PlaybackController {
    queue: AudioQueue,
    backend: Arc<dyn PlaybackBackend>,
    state_tx: Arc<watch::Sender<PlaybackState>>,
    epoch: Arc<AtomicU64>,
    on_stop: Option<StopCallback>,
    client: reqwest::Client,
    trigger_url: String,
}

impl PlaybackController {
    /// Create a controller over the given queue and backend
    #[must_use]
    pub fn new(queue: AudioQueue, backend: Arc<dyn PlaybackBackend>, base_url: &str) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        Self {
            queue,
            backend,
            state_tx: Arc::new(state_tx),
            epoch: Arc::new(AtomicU64::new(0)),
            on_stop: None,
            client: reqwest::Client::new(),
            trigger_url: format!("{}/play", base_url.trim_end_matches('/')),
        }
    }

    /// Register a callback invoked exactly once per completed stop
    #[must_use]
    pub fn with_stop_callback(mut self, callback: StopCallback) -> Self {
        self.on_stop = Some(callback);
        self
    }

    /// Observe playback-state transitions
    #[must_use]
    pub fn state(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    /// Whether a drain loop is currently active
    #[must_use]
    pub fn is_playing(&self) -> bool {
        *self.state_tx.borrow() == PlaybackState::Playing
    }

    /// Segments awaiting or currently in playback
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Start the drain loop if idle and the queue holds segments
    ///
    /// A no-op while a drain is already running; the running loop picks up
    /// newly-enqueued tail segments on its own.
    pub fn kick(&self) {
        if self.queue.is_empty() {
            return;
        }

        let started = self.state_tx.send_if_modified(|state| {
            if *state == PlaybackState::Idle {
                *state = PlaybackState::Playing;
                true
            } else {
                false
            }
        });
        if !started {
            return;
        }

        // A halt left standing by an earlier stop must not leak into this
        // drain; clearing happens only here, never between segments
        self.backend.clear_halt();

        let controller = self.clone();
        let epoch = self.epoch.load(Ordering::SeqCst);
        tokio::spawn(async move {
            controller.drain(epoch).await;
        });
    }

    /// Sequentially play queued segments until empty or cancelled
    async fn drain(&self, epoch: u64) {
        tracing::debug!(queue_len = self.queue.len(), "drain loop started");

        loop {
            // Cancellation is checked before every segment: nothing starts
            // playing once a stop has been requested
            if self.cancelled(epoch) {
                break;
            }
            let Some(segment) = self.queue.peek_head() else {
                break;
            };

            match self
                .backend
                .play(segment.payload(), AUDIO_MIME)
                .await
            {
                Ok(()) => {}
                Err(e) => {
                    // Per-segment failures are non-fatal; skip and continue
                    tracing::warn!(
                        handle = segment.handle(),
                        error = %e,
                        "segment playback failed, skipping"
                    );
                }
            }

            // A stop while we were suspended has already flushed the queue,
            // active segment included; popping here would double-release
            if self.cancelled(epoch) {
                break;
            }
            self.queue.pop_head();
        }

        // Natural completion; a stop in this epoch has already reported Idle
        if !self.cancelled(epoch) {
            self.state_tx.send_if_modified(|state| {
                if *state == PlaybackState::Playing {
                    *state = PlaybackState::Idle;
                    true
                } else {
                    false
                }
            });
            tracing::debug!("drain loop finished, queue empty");

            // An enqueue landing between the final peek and the transition
            // above saw Playing and declined to start; pick it up now
            if !self.queue.is_empty() {
                self.kick();
            }
        }
    }

    fn cancelled(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) != epoch
    }

    /// Halt playback immediately and discard everything queued
    ///
    /// The backend is halted rather than allowed to finish the active clip,
    /// the active segment and all pending ones are released, and observers
    /// never see `Playing` after this returns. Safe to call when idle.
    pub fn stop(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.backend.halt();
        let discarded = self.queue.flush();
        self.state_tx.send_if_modified(|state| {
            if *state == PlaybackState::Playing {
                *state = PlaybackState::Idle;
                true
            } else {
                false
            }
        });

        tracing::info!(discarded, "playback stopped");
        if let Some(callback) = &self.on_stop {
            callback();
        }
    }

    /// Signal the server to begin producing segments
    ///
    /// Fire-and-forget with respect to local playback: segments only play
    /// once they arrive on the push channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Trigger`] on network failure or a non-2xx response.
    /// Local state is unaffected either way, and the request is not retried.
    pub async fn request_play(&self) -> Result<()> {
        let response = self
            .client
            .post(&self.trigger_url)
            .send()
            .await
            .map_err(|e| Error::Trigger(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Trigger(format!("server returned {status}")));
        }
        tracing::info!("play trigger accepted");
        Ok(())
    }
}
