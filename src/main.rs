use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cadence_player::config::{DEFAULT_LANGUAGE, DEFAULT_SERVER_URL, DEFAULT_STOP_PHRASE};
use cadence_player::{Config, Daemon};

/// Cadence - voice-interruptible player for server-pushed audio streams
#[derive(Parser)]
#[command(name = "cadence", version, about)]
struct Cli {
    /// Server base URL (push channel at /sse, trigger at /play)
    #[arg(short, long, env = "CADENCE_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    /// Phrase that interrupts playback when heard
    #[arg(long, env = "CADENCE_STOP_PHRASE", default_value = DEFAULT_STOP_PHRASE)]
    stop_phrase: String,

    /// Recognition locale
    #[arg(long, env = "CADENCE_LANGUAGE", default_value = DEFAULT_LANGUAGE)]
    language: String,

    /// STT API key (enables voice control against the default endpoint)
    #[arg(long, env = "CADENCE_STT_API_KEY")]
    stt_api_key: Option<String>,

    /// STT endpoint URL (Whisper-compatible)
    #[arg(long, env = "CADENCE_STT_URL")]
    stt_url: Option<String>,

    /// Disable voice control (for headless hosts without a microphone)
    #[arg(long, env = "CADENCE_DISABLE_VOICE")]
    disable_voice: bool,

    /// Silence before an utterance is finalized, in milliseconds
    #[arg(long, default_value = "1500")]
    silence_threshold_ms: u64,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Consume the push channel and play segments (default)
    Run,
    /// Signal the server to start producing segments, then exit
    Trigger,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,cadence_player=info",
        1 => "info,cadence_player=debug",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config {
        server_url: cli.server_url.trim_end_matches('/').to_string(),
        stop_phrase: cli.stop_phrase,
        ..Config::default()
    };
    config.voice.enabled = !cli.disable_voice;
    config.voice.language = cli.language;
    config.voice.silence_threshold = Duration::from_millis(cli.silence_threshold_ms);
    if let Some(url) = cli.stt_url {
        config.voice.stt.endpoint = url;
    }
    config.voice.stt.api_key = cli.stt_api_key;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => Daemon::new(config).run().await.map_err(Into::into),
        Command::Trigger => trigger(&config).await,
    }
}

/// Send the play trigger and report the outcome
///
/// Posts directly instead of assembling a controller so the subcommand works
/// on hosts without audio hardware.
async fn trigger(config: &Config) -> anyhow::Result<()> {
    let url = format!("{}/play", config.server_url);
    let response = reqwest::Client::new().post(&url).send().await?;
    anyhow::ensure!(
        response.status().is_success(),
        "server returned {}",
        response.status()
    );
    println!("play trigger accepted by {}", config.server_url);
    Ok(())
}
