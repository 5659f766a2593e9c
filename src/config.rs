//! Configuration for the Cadence player

use std::time::Duration;

/// Default server base URL
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

/// Default voice stop phrase
pub const DEFAULT_STOP_PHRASE: &str = "stop stopada";

/// Default recognition locale
pub const DEFAULT_LANGUAGE: &str = "id-ID";

/// Fixed delay between push-channel reconnect attempts
pub const RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Player configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server base URL (push channel at `{server_url}/sse`,
    /// trigger endpoint at `{server_url}/play`)
    pub server_url: String,

    /// Delay between reconnect attempts for the push channel
    pub reconnect_delay: Duration,

    /// Phrase that interrupts playback when heard
    pub stop_phrase: String,

    /// Voice recognition configuration
    pub voice: VoiceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            reconnect_delay: RECONNECT_DELAY,
            stop_phrase: DEFAULT_STOP_PHRASE.to_string(),
            voice: VoiceConfig::default(),
        }
    }
}

/// Voice recognition configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable voice input
    pub enabled: bool,

    /// Recognition locale (e.g. "id-ID")
    pub language: String,

    /// Silence after the last hypothesis before an utterance is finalized
    pub silence_threshold: Duration,

    /// Consecutive no-speech errors before listening stops permanently
    pub max_no_speech_errors: u32,

    /// Delay before a replacement recognition session is started
    pub restart_delay: Duration,

    /// Speech-to-text endpoint configuration
    pub stt: SttConfig,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: DEFAULT_LANGUAGE.to_string(),
            silence_threshold: Duration::from_millis(1500),
            max_no_speech_errors: 3,
            restart_delay: Duration::from_millis(1000),
            stt: SttConfig::default(),
        }
    }
}

/// Speech-to-text endpoint configuration (Whisper-compatible HTTP API)
#[derive(Debug, Clone)]
pub struct SttConfig {
    /// Transcription endpoint URL
    pub endpoint: String,

    /// API key, sent as a bearer token when present
    pub api_key: Option<String>,

    /// Model identifier (e.g. "whisper-1")
    pub model: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/audio/transcriptions".to_string(),
            api_key: None,
            model: "whisper-1".to_string(),
        }
    }
}
