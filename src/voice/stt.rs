//! HTTP speech backend
//!
//! A concrete [`SpeechBackend`] over a Whisper-compatible transcription
//! endpoint. Each session captures microphone audio and periodically posts
//! the accumulated window for transcription, emitting the returned text as a
//! growing hypothesis. Sessions behave like the host engines the recognizer
//! is built for: they report `no-speech` when the window stays empty and
//! terminate themselves after a fixed lifetime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::SttConfig;
use crate::voice::capture::{samples_to_wav, MicCapture, CAPTURE_SAMPLE_RATE};
use crate::voice::session::{
    SessionConfig, SessionErrorKind, SessionEvent, SpeechBackend, SpeechSession,
};
use crate::{Error, Result};

/// How often the capture thread hands off buffered samples
const CAPTURE_TICK: Duration = Duration::from_millis(250);

/// How often the accumulated window is posted for transcription
const TRANSCRIBE_INTERVAL: Duration = Duration::from_millis(1200);

/// Silence with no transcript before the session reports `no-speech`
const NO_SPEECH_WINDOW: Duration = Duration::from_secs(8);

/// Sessions terminate themselves after this long, like the host engine
const SESSION_LIFETIME: Duration = Duration::from_secs(60);

/// Response from a Whisper-compatible transcription API
#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Factory for HTTP-backed recognition sessions
pub struct HttpSttBackend {
    config: SttConfig,
    client: reqwest::Client,
}

impl HttpSttBackend {
    /// Create a backend for the configured endpoint
    #[must_use]
    pub fn new(config: SttConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Post a WAV window for transcription
    async fn transcribe(&self, wav: Vec<u8>, language: &str) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| Error::Stt(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.config.model.clone())
            .text("language", language.split('-').next().unwrap_or("en").to_string());

        let mut request = self.client.post(&self.config.endpoint).multipart(form);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| Error::Stt(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Stt(format!("transcription API error {status}: {body}")));
        }

        let result: TranscriptionResponse =
            response.json().await.map_err(|e| Error::Stt(e.to_string()))?;
        Ok(result.text)
    }
}

impl SpeechBackend for HttpSttBackend {
    fn create_session(
        &self,
        config: &SessionConfig,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Box<dyn SpeechSession>> {
        Ok(Box::new(HttpSession {
            backend: Self {
                config: self.config.clone(),
                client: self.client.clone(),
            },
            language: config.language.clone(),
            events_tx: Some(events_tx),
            stopped: Arc::new(AtomicBool::new(false)),
        }))
    }
}

/// One live HTTP-backed recognition session
struct HttpSession {
    backend: HttpSttBackend,
    language: String,
    events_tx: Option<mpsc::UnboundedSender<SessionEvent>>,
    stopped: Arc<AtomicBool>,
}

impl SpeechSession for HttpSession {
    fn start(&mut self) -> Result<()> {
        let events_tx = self
            .events_tx
            .take()
            .ok_or_else(|| Error::Recognition("session already started".to_string()))?;

        // cpal streams are not Send, so the microphone lives on its own
        // thread and hands sample chunks to the async side over a channel;
        // device-open failures are relayed back before start() returns
        let (samples_tx, samples_rx) = mpsc::unbounded_channel::<Vec<f32>>();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();
        let stopped = Arc::clone(&self.stopped);

        std::thread::spawn(move || {
            let mut capture = match MicCapture::new().and_then(|mut c| c.start().map(|()| c)) {
                Ok(capture) => {
                    let _ = ready_tx.send(Ok(()));
                    capture
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            while !stopped.load(Ordering::SeqCst) {
                std::thread::sleep(CAPTURE_TICK);
                let samples = capture.take_buffer();
                if !samples.is_empty() && samples_tx.send(samples).is_err() {
                    break;
                }
            }
            capture.stop();
        });

        ready_rx
            .recv()
            .map_err(|_| Error::Recognition("capture thread died during startup".to_string()))??;

        let backend = HttpSttBackend {
            config: self.backend.config.clone(),
            client: self.backend.client.clone(),
        };
        let language = self.language.clone();
        let stopped = Arc::clone(&self.stopped);
        tokio::spawn(run_session(backend, language, stopped, samples_rx, events_tx));

        Ok(())
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

impl Drop for HttpSession {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Accumulate audio and post it for transcription until the session ends
async fn run_session(
    backend: HttpSttBackend,
    language: String,
    stopped: Arc<AtomicBool>,
    mut samples_rx: mpsc::UnboundedReceiver<Vec<f32>>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
) {
    let started_at = Instant::now();
    let mut last_transcript_at = Instant::now();
    let mut window: Vec<f32> = Vec::new();
    let mut last_text = String::new();
    let mut ticker = tokio::time::interval(TRANSCRIBE_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            chunk = samples_rx.recv() => match chunk {
                Some(chunk) => window.extend_from_slice(&chunk),
                None => break,
            },
            _ = ticker.tick() => {
                if stopped.load(Ordering::SeqCst) {
                    break;
                }
                if started_at.elapsed() > SESSION_LIFETIME {
                    tracing::debug!("session lifetime exhausted");
                    break;
                }

                if window.is_empty() {
                    continue;
                }
                let wav = match samples_to_wav(&window, CAPTURE_SAMPLE_RATE) {
                    Ok(wav) => wav,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to encode capture window");
                        continue;
                    }
                };

                match backend.transcribe(wav, &language).await {
                    Ok(text) => {
                        let text = text.trim().to_string();
                        if text.is_empty() || text == last_text {
                            if last_transcript_at.elapsed() > NO_SPEECH_WINDOW {
                                let _ = events_tx.send(SessionEvent::Error(SessionErrorKind::NoSpeech));
                                break;
                            }
                        } else {
                            last_transcript_at = Instant::now();
                            last_text.clone_from(&text);
                            let _ = events_tx.send(SessionEvent::Hypothesis {
                                transcript: text,
                                is_final: false,
                            });
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "transcription failed");
                        let _ = events_tx.send(SessionEvent::Error(SessionErrorKind::Other(
                            e.to_string(),
                        )));
                        break;
                    }
                }
            }
        }
    }

    stopped.store(true, Ordering::SeqCst);
    let _ = events_tx.send(SessionEvent::Ended);
}
