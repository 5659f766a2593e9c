//! Voice command matching
//!
//! Routes finalized utterances to playback control. The only command is the
//! configured stop phrase; matching is containment after normalization.

/// Action derived from an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    /// Utterance contained the stop phrase
    Stop,
    /// No command recognized
    None,
}

/// Matches utterances against the configured stop phrase
pub struct VoiceCommandBridge {
    stop_phrase: String,
    last_utterance: Option<String>,
}

impl VoiceCommandBridge {
    /// Create a bridge for the given stop phrase
    #[must_use]
    pub fn new(stop_phrase: &str) -> Self {
        Self {
            stop_phrase: stop_phrase.to_lowercase().trim().to_string(),
            last_utterance: None,
        }
    }

    /// Classify an utterance, remembering it for display
    pub fn observe(&mut self, utterance: &str) -> CommandAction {
        self.last_utterance = Some(utterance.to_string());

        let normalized = utterance.to_lowercase();
        if normalized.trim().contains(&self.stop_phrase) {
            tracing::info!(utterance, "stop phrase matched");
            CommandAction::Stop
        } else {
            CommandAction::None
        }
    }

    /// The most recently observed utterance, kept only for display
    #[must_use]
    pub fn last_utterance(&self) -> Option<&str> {
        self.last_utterance.as_deref()
    }

    /// The normalized stop phrase
    #[must_use]
    pub fn stop_phrase(&self) -> &str {
        &self.stop_phrase
    }
}
