//! Long-lived push-channel client
//!
//! Holds a persistent SSE connection to `{base_url}/sse` and forwards named
//! events to a subscriber channel. Transport failures are never fatal: the
//! client waits a fixed delay and reconnects, forever, so the player recovers
//! on its own once the server returns.
//!
//! The client decodes nothing itself. Raw `audio` payloads are forwarded
//! upstream so a malformed segment cannot tear down the transport.

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::stream::sse::SseParser;
use crate::{Error, Result};

/// Connection state of the push channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live link to the server
    Disconnected,
    /// Server has confirmed the link with a `connected` or `heartbeat` event
    Connected,
}

/// Event forwarded to push-channel subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Server marked the link up
    Connected,
    /// Periodic keepalive, also marks the link up
    Heartbeat,
    /// One base64-encoded audio segment, undecoded
    Audio(String),
    /// Transport dropped; a reconnect attempt is already scheduled
    Disconnected {
        /// Human-readable cause
        reason: String,
    },
}

/// Consumes the server's SSE push channel with automatic reconnection
pub struct EventStreamClient {
    url: String,
    reconnect_delay: Duration,
    client: reqwest::Client,
}

/// Handle to a running stream task
pub struct StreamHandle {
    shutdown_tx: mpsc::Sender<()>,
    state_rx: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl StreamHandle {
    /// Observe connection-state transitions
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Tear down the transport deterministically; idempotent
    pub async fn close(self) {
        // Send fails only if the task already exited, which is fine
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}

impl EventStreamClient {
    /// Create a client for the given server base URL
    #[must_use]
    pub fn new(base_url: &str, reconnect_delay: Duration) -> Self {
        Self {
            url: format!("{}/sse", base_url.trim_end_matches('/')),
            reconnect_delay,
            client: reqwest::Client::new(),
        }
    }

    /// Spawn the connection task, forwarding events to `events_tx`
    ///
    /// The task runs until the returned handle is closed.
    #[must_use]
    pub fn spawn(self, events_tx: mpsc::UnboundedSender<StreamEvent>) -> StreamHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let task = tokio::spawn(async move {
            loop {
                let reason = tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    res = self.consume_once(&events_tx, &state_tx) => match res {
                        Ok(()) => "stream ended".to_string(),
                        Err(e) => e.to_string(),
                    },
                };

                let _ = state_tx.send(ConnectionState::Disconnected);
                if events_tx
                    .send(StreamEvent::Disconnected {
                        reason: reason.clone(),
                    })
                    .is_err()
                {
                    // Subscriber gone, nothing left to serve
                    break;
                }
                tracing::warn!(
                    reason,
                    delay_ms = self.reconnect_delay.as_millis() as u64,
                    "push channel down, reconnecting"
                );

                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    () = tokio::time::sleep(self.reconnect_delay) => {}
                }
            }
            let _ = state_tx.send(ConnectionState::Disconnected);
            tracing::debug!("push channel closed");
        });

        StreamHandle {
            shutdown_tx,
            state_rx,
            task,
        }
    }

    /// Hold one connection open until the transport drops
    ///
    /// The link is only marked up once the server sends its `connected` (or
    /// `heartbeat`) event; a transport-level open alone proves nothing.
    async fn consume_once(
        &self,
        events_tx: &mpsc::UnboundedSender<StreamEvent>,
        state_tx: &watch::Sender<ConnectionState>,
    ) -> Result<()> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("server returned {status}")));
        }
        tracing::debug!(url = %self.url, "push channel transport open");

        let mut parser = SseParser::new();
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| Error::Transport(e.to_string()))?;

            for event in parser.feed(&chunk) {
                let forwarded = match event.name.as_str() {
                    "connected" => {
                        let _ = state_tx.send(ConnectionState::Connected);
                        tracing::info!("connected to push channel");
                        StreamEvent::Connected
                    }
                    "heartbeat" => {
                        let _ = state_tx.send(ConnectionState::Connected);
                        StreamEvent::Heartbeat
                    }
                    "audio" => {
                        tracing::debug!(payload_len = event.data.len(), "audio event received");
                        StreamEvent::Audio(event.data)
                    }
                    other => {
                        tracing::trace!(event = other, "ignoring unknown event");
                        continue;
                    }
                };

                if events_tx.send(forwarded).is_err() {
                    return Ok(());
                }
            }
        }

        Ok(())
    }
}
