//! Continuous speech recognizer
//!
//! Wraps a host engine whose sessions silently terminate after short
//! silences. The recognizer keeps listening by replacing sessions: a silence
//! timer debounces utterance finalization, every finalized utterance triggers
//! a session restart, and error-driven restarts are bounded so a dead
//! microphone cannot spin the loop forever.
//!
//! The whole state machine runs on one task, so the restart guard and timer
//! exclusivity (one silence timer, one restart timer) are structural rather
//! than flag-based.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::VoiceConfig;
use crate::voice::session::{
    SessionConfig, SessionErrorKind, SessionEvent, SpeechBackend, SpeechSession,
};

/// Observable recognizer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognizerState {
    /// Not listening; only an explicit `start` leaves this state
    Stopped,
    /// A session is live and delivering hypotheses
    Listening,
    /// Between sessions, waiting out the restart delay
    Restarting,
}

/// Recognizer tuning, mirroring [`VoiceConfig`]
#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    /// Recognition locale
    pub language: String,
    /// Silence after the last hypothesis before the utterance is finalized
    pub silence_threshold: std::time::Duration,
    /// Consecutive no-speech errors before listening stops permanently
    pub max_no_speech_errors: u32,
    /// Delay before a replacement session is created
    pub restart_delay: std::time::Duration,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self::from(&VoiceConfig::default())
    }
}

impl From<&VoiceConfig> for RecognizerConfig {
    fn from(voice: &VoiceConfig) -> Self {
        Self {
            language: voice.language.clone(),
            silence_threshold: voice.silence_threshold,
            max_no_speech_errors: voice.max_no_speech_errors,
            restart_delay: voice.restart_delay,
        }
    }
}

/// Control messages accepted by the recognizer task
enum Control {
    Start,
    Stop,
}

/// Handle to a running recognizer task
pub struct RecognizerHandle {
    control_tx: mpsc::UnboundedSender<Control>,
    state_rx: watch::Receiver<RecognizerState>,
    task: JoinHandle<()>,
}

impl RecognizerHandle {
    /// Begin listening; a no-op unless currently stopped
    pub fn start(&self) {
        let _ = self.control_tx.send(Control::Start);
    }

    /// Stop listening; idempotent, safe while a restart is in flight
    pub fn stop(&self) {
        let _ = self.control_tx.send(Control::Stop);
    }

    /// Observe state transitions
    #[must_use]
    pub fn state(&self) -> watch::Receiver<RecognizerState> {
        self.state_rx.clone()
    }

    /// Whether a session is currently live
    #[must_use]
    pub fn is_listening(&self) -> bool {
        *self.state_rx.borrow() == RecognizerState::Listening
    }

    /// Shut the recognizer down and wait for its task to finish
    pub async fn close(self) {
        drop(self.control_tx);
        let _ = self.task.await;
    }
}

/// Continuously-listening speech recognizer
pub struct SpeechRecognizer;

impl SpeechRecognizer {
    /// Spawn the recognizer task
    ///
    /// Finalized utterances are delivered on `utterances_tx`. The task runs
    /// until the handle is closed.
    #[must_use]
    pub fn spawn(
        backend: Arc<dyn SpeechBackend>,
        config: RecognizerConfig,
        utterances_tx: mpsc::UnboundedSender<String>,
    ) -> RecognizerHandle {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(RecognizerState::Stopped);

        let core = Core {
            backend,
            config,
            utterances_tx,
            state_tx,
            session: None,
            should_continue: false,
            restarting: false,
            transcript: String::new(),
            last_result_at: Instant::now(),
            no_speech_errors: 0,
            silence_deadline: None,
            restart_at: None,
        };
        let task = tokio::spawn(run(core, control_rx));

        RecognizerHandle {
            control_tx,
            state_rx,
            task,
        }
    }
}

/// Recognizer state, owned exclusively by the run task
struct Core {
    backend: Arc<dyn SpeechBackend>,
    config: RecognizerConfig,
    utterances_tx: mpsc::UnboundedSender<String>,
    state_tx: watch::Sender<RecognizerState>,
    session: Option<Box<dyn SpeechSession>>,
    should_continue: bool,
    restarting: bool,
    transcript: String,
    last_result_at: Instant,
    no_speech_errors: u32,
    silence_deadline: Option<Instant>,
    restart_at: Option<Instant>,
}

/// Drive the state machine until the control channel closes
async fn run(mut core: Core, mut control_rx: mpsc::UnboundedReceiver<Control>) {
    let mut session_rx: Option<mpsc::UnboundedReceiver<SessionEvent>> = None;

    loop {
        tokio::select! {
            control = control_rx.recv() => match control {
                Some(Control::Start) => {
                    if let Some(rx) = core.handle_start() {
                        session_rx = Some(rx);
                    }
                }
                Some(Control::Stop) => core.handle_stop(),
                None => break,
            },
            event = recv_opt(&mut session_rx) => match event {
                Some(event) => {
                    if core.handle_session_event(event) {
                        session_rx = None;
                    }
                }
                // Session dropped its sender without an Ended event
                None => {
                    session_rx = None;
                    let _ = core.handle_session_event(SessionEvent::Ended);
                }
            },
            () = sleep_opt(core.silence_deadline) => {
                if core.on_silence_elapsed() {
                    session_rx = None;
                }
            }
            () = sleep_opt(core.restart_at) => {
                if let Some(rx) = core.on_restart_due() {
                    session_rx = Some(rx);
                }
            }
        }
    }

    core.shutdown();
}

/// Receive from an optional channel; pends forever when there is none
async fn recv_opt(
    rx: &mut Option<mpsc::UnboundedReceiver<SessionEvent>>,
) -> Option<SessionEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Sleep until an optional deadline; pends forever when there is none
async fn sleep_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl Core {
    /// Handle an explicit start request
    ///
    /// Returns the new session's event receiver when a session was created.
    fn handle_start(&mut self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        if *self.state_tx.borrow() != RecognizerState::Stopped {
            tracing::warn!("start ignored: recognizer already listening or restarting");
            return None;
        }

        self.should_continue = true;
        self.restarting = false;
        self.no_speech_errors = 0;
        self.transcript.clear();
        self.open_session()
    }

    /// Handle an explicit stop request
    fn handle_stop(&mut self) {
        self.should_continue = false;
        self.silence_deadline = None;

        if self.restarting {
            // The pending restart observes the flag when its timer fires
            tracing::debug!("stop requested during restart");
            return;
        }
        if let Some(session) = self.session.as_mut() {
            // The session's Ended event completes the transition to Stopped
            session.stop();
        } else {
            self.state_tx.send_replace(RecognizerState::Stopped);
        }
    }

    /// Handle one event from the live session
    ///
    /// Returns true when the session's event receiver should be dropped.
    fn handle_session_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Hypothesis { transcript, .. } => {
                self.no_speech_errors = 0;
                self.last_result_at = Instant::now();
                // Re-arm the silence timer; the previous deadline is replaced,
                // never duplicated
                self.silence_deadline = Some(self.last_result_at + self.config.silence_threshold);
                tracing::debug!(transcript = %transcript, "hypothesis");
                self.transcript = transcript;
                false
            }
            SessionEvent::Ended => self.on_session_ended(),
            SessionEvent::Error(kind) => self.on_session_error(&kind),
        }
    }

    /// The silence timer fired with no newer hypothesis
    ///
    /// Returns true when a restart was begun (old receiver must be dropped).
    fn on_silence_elapsed(&mut self) -> bool {
        self.silence_deadline = None;
        if self.transcript.trim().is_empty() {
            return false;
        }

        self.emit_utterance();
        // The host engine cannot resume after a silence; replace the session
        // to keep listening
        self.begin_restart()
    }

    /// The host session terminated
    fn on_session_ended(&mut self) -> bool {
        if self.restarting {
            // Our own restart stopped it; the replacement is already scheduled
            self.session = None;
            return true;
        }

        tracing::info!("session ended by host");
        self.session = None;
        self.silence_deadline = None;
        if !self.transcript.trim().is_empty() {
            self.emit_utterance();
        }
        self.should_continue = false;
        self.state_tx.send_replace(RecognizerState::Stopped);
        true
    }

    /// The host session reported an error
    fn on_session_error(&mut self, kind: &SessionErrorKind) -> bool {
        match kind {
            SessionErrorKind::NoSpeech => {
                self.no_speech_errors += 1;
                tracing::debug!(count = self.no_speech_errors, "no-speech error");

                // The bound wins over every other condition: once reached,
                // listening stops until an explicit start
                if self.no_speech_errors >= self.config.max_no_speech_errors {
                    tracing::info!(
                        limit = self.config.max_no_speech_errors,
                        "consecutive no-speech limit reached, stopping"
                    );
                    return self.stop_terminally();
                }

                let since_last_result = Instant::now() - self.last_result_at;
                if since_last_result < self.config.silence_threshold || self.should_continue {
                    return self.begin_restart();
                }
                self.stop_terminally()
            }
            SessionErrorKind::Other(message) => {
                tracing::warn!(error = %message, "session error");
                if self.should_continue {
                    self.begin_restart()
                } else {
                    self.stop_terminally()
                }
            }
        }
    }

    /// Begin replacing the current session after the restart delay
    ///
    /// Returns true when the old session's receiver should be dropped, which
    /// silences its end notification so it cannot trigger a second restart.
    fn begin_restart(&mut self) -> bool {
        if self.restarting || !self.should_continue {
            return false;
        }

        self.restarting = true;
        self.silence_deadline = None;
        self.state_tx.send_replace(RecognizerState::Restarting);
        if let Some(mut session) = self.session.take() {
            session.stop();
        }
        self.restart_at = Some(Instant::now() + self.config.restart_delay);
        tracing::debug!(
            delay_ms = self.config.restart_delay.as_millis() as u64,
            "session restart scheduled"
        );
        true
    }

    /// The restart delay elapsed; create the replacement session
    fn on_restart_due(&mut self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.restart_at = None;
        self.restarting = false;

        if !self.should_continue {
            // A stop arrived while the restart was in flight
            self.state_tx.send_replace(RecognizerState::Stopped);
            return None;
        }
        self.open_session()
    }

    /// Create and start a fresh session with the fixed configuration
    ///
    /// Creation or start failure is fatal: listening surfaces as Stopped and
    /// only an explicit start recovers.
    fn open_session(&mut self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let config = SessionConfig::continuous(&self.config.language);

        let session = self
            .backend
            .create_session(&config, events_tx)
            .and_then(|mut session| session.start().map(|()| session));

        match session {
            Ok(session) => {
                self.session = Some(session);
                self.state_tx.send_replace(RecognizerState::Listening);
                tracing::debug!(language = %self.config.language, "session listening");
                Some(events_rx)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to create recognition session, giving up");
                self.should_continue = false;
                self.session = None;
                self.state_tx.send_replace(RecognizerState::Stopped);
                None
            }
        }
    }

    /// Stop listening until an explicit start
    fn stop_terminally(&mut self) -> bool {
        self.should_continue = false;
        self.restarting = false;
        self.silence_deadline = None;
        self.restart_at = None;
        if let Some(mut session) = self.session.take() {
            session.stop();
        }
        self.state_tx.send_replace(RecognizerState::Stopped);
        true
    }

    /// Send the buffered transcript as a finalized utterance
    fn emit_utterance(&mut self) {
        let utterance = self.transcript.trim().to_string();
        tracing::info!(utterance = %utterance, "utterance finalized");
        let _ = self.utterances_tx.send(utterance);
        self.transcript.clear();
        self.no_speech_errors = 0;
    }

    /// Final cleanup when the handle is dropped
    fn shutdown(&mut self) {
        self.should_continue = false;
        if let Some(mut session) = self.session.take() {
            session.stop();
        }
        self.state_tx.send_replace(RecognizerState::Stopped);
    }
}
