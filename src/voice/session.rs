//! Speech session abstraction
//!
//! The host speech engine is modeled as a factory of disposable sessions.
//! A terminated session cannot be resumed, only recreated with identical
//! configuration, and it may end itself at any time; the recognizer is built
//! around those two facts.

use tokio::sync::mpsc;

use crate::Result;

/// Fixed configuration every session is created with
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Keep recognizing across pauses instead of stopping at the first result
    pub continuous: bool,
    /// Deliver partial hypotheses while speech is still in progress
    pub interim_results: bool,
    /// Recognition locale (e.g. "id-ID")
    pub language: String,
}

impl SessionConfig {
    /// Continuous interim-result configuration for the given locale
    #[must_use]
    pub fn continuous(language: &str) -> Self {
        Self {
            continuous: true,
            interim_results: true,
            language: language.to_string(),
        }
    }
}

/// Classified session error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionErrorKind {
    /// The engine heard nothing; retried up to a bound
    NoSpeech,
    /// Any other engine error
    Other(String),
}

/// Notification delivered by a live session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A (possibly partial) transcript hypothesis
    Hypothesis {
        /// Latest transcript text for the current utterance
        transcript: String,
        /// Whether the engine considers the hypothesis final
        is_final: bool,
    },
    /// The session terminated, voluntarily or not
    Ended,
    /// The engine reported an error
    Error(SessionErrorKind),
}

/// Factory for recognition sessions
pub trait SpeechBackend: Send + Sync {
    /// Create a session that reports events on `events_tx`
    ///
    /// The session does not listen until [`SpeechSession::start`] is called.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be instantiated; the recognizer
    /// treats that as fatal and stops listening.
    fn create_session(
        &self,
        config: &SessionConfig,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Box<dyn SpeechSession>>;
}

/// One live instance of the host recognizer
pub trait SpeechSession: Send {
    /// Begin listening
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the start
    fn start(&mut self) -> Result<()>;

    /// Stop listening; the session emits `Ended` and cannot be restarted
    fn stop(&mut self);
}
