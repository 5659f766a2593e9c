//! Daemon - the running player
//!
//! Wires the push channel into the playback queue and the recognizer into
//! playback control, then runs until interrupted:
//!
//! server ──SSE──▶ stream client ──▶ queue ──▶ controller ──▶ speakers
//! microphone ──▶ recognizer ──▶ command bridge ──▶ controller.stop()

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::player::{AudioQueue, DeviceBackend, PlaybackBackend, PlaybackController};
use crate::stream::{EventStreamClient, StreamEvent};
use crate::voice::{
    CommandAction, HttpSttBackend, RecognizerConfig, RecognizerHandle, SpeechBackend,
    SpeechRecognizer, VoiceCommandBridge,
};
use crate::Result;

/// The assembled player
pub struct Daemon {
    config: Config,
}

impl Daemon {
    /// Create a daemon from configuration
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run until ctrl-c
    ///
    /// # Errors
    ///
    /// Returns an error if the audio output device cannot be opened
    pub async fn run(self) -> Result<()> {
        let speech = voice_backend(&self.config);
        let backend: Arc<dyn PlaybackBackend> = Arc::new(DeviceBackend::new()?);
        self.run_with_backends(backend, speech).await
    }

    /// Run with explicit backends (used by tests and headless setups)
    ///
    /// # Errors
    ///
    /// Propagates setup failures from the wiring
    pub async fn run_with_backends(
        self,
        playback: Arc<dyn PlaybackBackend>,
        speech: Option<Arc<dyn SpeechBackend>>,
    ) -> Result<()> {
        let queue = AudioQueue::new();
        let controller = PlaybackController::new(queue.clone(), playback, &self.config.server_url);

        // Push channel
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let stream = EventStreamClient::new(&self.config.server_url, self.config.reconnect_delay)
            .spawn(events_tx);

        // Voice control
        let mut bridge = VoiceCommandBridge::new(&self.config.stop_phrase);
        let (utterances_tx, mut utterances_rx) = mpsc::unbounded_channel();
        let recognizer: Option<RecognizerHandle> = speech.map(|backend| {
            let handle = SpeechRecognizer::spawn(
                backend,
                RecognizerConfig::from(&self.config.voice),
                utterances_tx,
            );
            handle.start();
            handle
        });

        tracing::info!(
            server = %self.config.server_url,
            stop_phrase = %self.config.stop_phrase,
            voice = recognizer.is_some(),
            "player running"
        );

        loop {
            tokio::select! {
                Some(event) = events_rx.recv() => self.handle_stream_event(event, &queue, &controller),
                Some(utterance) = utterances_rx.recv() => {
                    if bridge.observe(&utterance) == CommandAction::Stop {
                        controller.stop();
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("interrupt received, shutting down");
                    break;
                }
            }
        }

        controller.stop();
        stream.close().await;
        if let Some(recognizer) = recognizer {
            recognizer.stop();
            recognizer.close().await;
        }
        Ok(())
    }

    /// Route one push-channel event
    fn handle_stream_event(
        &self,
        event: StreamEvent,
        queue: &AudioQueue,
        controller: &PlaybackController,
    ) {
        match event {
            StreamEvent::Audio(raw) => {
                // A malformed segment is dropped; playback continues
                match queue.enqueue(&raw) {
                    Ok(_) => controller.kick(),
                    Err(e) => tracing::warn!(error = %e, "dropping malformed segment"),
                }
            }
            StreamEvent::Connected => tracing::info!("server link up"),
            StreamEvent::Heartbeat => tracing::trace!("heartbeat"),
            StreamEvent::Disconnected { reason } => {
                tracing::warn!(reason, "server link down");
            }
        }
    }
}

/// Build the speech backend when voice control is enabled
fn voice_backend(config: &Config) -> Option<Arc<dyn SpeechBackend>> {
    if !config.voice.enabled {
        return None;
    }
    Some(Arc::new(HttpSttBackend::new(config.voice.stt.clone())))
}
