//! Voice control
//!
//! A speech recognizer listens continuously for the stop phrase. The host
//! engine behind it terminates sessions after short silences, so the
//! recognizer replaces sessions instead of resuming them and bounds its
//! error-driven restarts.

mod capture;
mod command;
mod recognizer;
mod session;
mod stt;

pub use capture::{samples_to_wav, MicCapture, CAPTURE_SAMPLE_RATE};
pub use command::{CommandAction, VoiceCommandBridge};
pub use recognizer::{RecognizerConfig, RecognizerHandle, RecognizerState, SpeechRecognizer};
pub use session::{SessionConfig, SessionErrorKind, SessionEvent, SpeechBackend, SpeechSession};
pub use stt::HttpSttBackend;
