//! Speech recognizer integration tests
//!
//! Drives the state machine with a scripted speech backend under paused time,
//! so silence and restart timers fire deterministically.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use cadence_player::{
    RecognizerConfig, RecognizerHandle, RecognizerState, SessionErrorKind, SessionEvent,
    SpeechRecognizer,
};
use common::FakeSpeech;

fn test_config() -> RecognizerConfig {
    RecognizerConfig {
        language: "id-ID".to_string(),
        silence_threshold: Duration::from_millis(1500),
        max_no_speech_errors: 3,
        restart_delay: Duration::from_millis(1000),
    }
}

fn spawn_recognizer(
    backend: &Arc<FakeSpeech>,
) -> (RecognizerHandle, mpsc::UnboundedReceiver<String>) {
    let (utterances_tx, utterances_rx) = mpsc::unbounded_channel();
    let handle = SpeechRecognizer::spawn(backend.clone(), test_config(), utterances_tx);
    (handle, utterances_rx)
}

async fn wait_state(state: &mut watch::Receiver<RecognizerState>, expected: RecognizerState) {
    state
        .wait_for(|s| *s == expected)
        .await
        .expect("state channel closed");
}

fn hypothesis(text: &str) -> SessionEvent {
    SessionEvent::Hypothesis {
        transcript: text.to_string(),
        is_final: false,
    }
}

#[tokio::test(start_paused = true)]
async fn silence_finalizes_last_hypothesis_and_restarts() {
    let backend = FakeSpeech::new();
    let (handle, mut utterances) = spawn_recognizer(&backend);
    let mut state = handle.state();

    handle.start();
    wait_state(&mut state, RecognizerState::Listening).await;
    assert_eq!(backend.session_count(), 1);

    // A growing hypothesis: only the last one is finalized
    backend.send(hypothesis("stop"));
    backend.send(hypothesis("stop stopada"));

    // Paused time auto-advances to the silence deadline
    let utterance = utterances.recv().await.unwrap();
    assert_eq!(utterance, "stop stopada");

    // The utterance triggers a session replacement
    wait_state(&mut state, RecognizerState::Listening).await;
    assert_eq!(backend.session_count(), 2);
    assert!(backend.is_stopped(0));

    // Buffer was cleared on finalization: an external end right after the
    // restart emits nothing further
    backend.send(SessionEvent::Ended);
    wait_state(&mut state, RecognizerState::Stopped).await;
    assert!(utterances.try_recv().is_err());

    handle.close().await;
}

#[tokio::test(start_paused = true)]
async fn sessions_are_created_with_continuous_interim_config() {
    let backend = FakeSpeech::new();
    let (handle, _utterances) = spawn_recognizer(&backend);
    let mut state = handle.state();

    handle.start();
    wait_state(&mut state, RecognizerState::Listening).await;

    let config = backend.config(0);
    assert!(config.continuous);
    assert!(config.interim_results);
    assert_eq!(config.language, "id-ID");

    handle.close().await;
}

#[tokio::test(start_paused = true)]
async fn start_is_a_noop_while_listening() {
    let backend = FakeSpeech::new();
    let (handle, _utterances) = spawn_recognizer(&backend);
    let mut state = handle.state();

    handle.start();
    wait_state(&mut state, RecognizerState::Listening).await;
    handle.start();
    handle.start();

    // Give the control messages time to be processed
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(backend.session_count(), 1);

    handle.close().await;
}

#[tokio::test(start_paused = true)]
async fn no_speech_limit_stops_permanently_until_explicit_start() {
    let backend = FakeSpeech::new();
    let (handle, mut utterances) = spawn_recognizer(&backend);
    let mut state = handle.state();

    handle.start();
    wait_state(&mut state, RecognizerState::Listening).await;

    // Errors 1 and 2 trigger bounded restarts
    backend.send(SessionEvent::Error(SessionErrorKind::NoSpeech));
    wait_state(&mut state, RecognizerState::Restarting).await;
    wait_state(&mut state, RecognizerState::Listening).await;
    assert_eq!(backend.session_count(), 2);

    backend.send(SessionEvent::Error(SessionErrorKind::NoSpeech));
    wait_state(&mut state, RecognizerState::Restarting).await;
    wait_state(&mut state, RecognizerState::Listening).await;
    assert_eq!(backend.session_count(), 3);

    // The third consecutive error reaches the bound: no further restart
    backend.send(SessionEvent::Error(SessionErrorKind::NoSpeech));
    wait_state(&mut state, RecognizerState::Stopped).await;
    tokio::time::sleep(Duration::from_millis(5000)).await;
    assert_eq!(backend.session_count(), 3);
    assert!(utterances.try_recv().is_err());

    // Only an explicit start recovers
    handle.start();
    wait_state(&mut state, RecognizerState::Listening).await;
    assert_eq!(backend.session_count(), 4);

    handle.close().await;
}

#[tokio::test(start_paused = true)]
async fn hypothesis_resets_no_speech_counter() {
    let backend = FakeSpeech::new();
    let (handle, mut utterances) = spawn_recognizer(&backend);
    let mut state = handle.state();

    handle.start();
    wait_state(&mut state, RecognizerState::Listening).await;

    backend.send(SessionEvent::Error(SessionErrorKind::NoSpeech));
    wait_state(&mut state, RecognizerState::Restarting).await;
    wait_state(&mut state, RecognizerState::Listening).await;
    backend.send(SessionEvent::Error(SessionErrorKind::NoSpeech));
    wait_state(&mut state, RecognizerState::Restarting).await;
    wait_state(&mut state, RecognizerState::Listening).await;

    // A result clears the streak; the next error stays under the bound
    backend.send(hypothesis("halo"));
    let _ = utterances.recv().await.unwrap();
    wait_state(&mut state, RecognizerState::Listening).await;

    backend.send(SessionEvent::Error(SessionErrorKind::NoSpeech));
    wait_state(&mut state, RecognizerState::Restarting).await;
    wait_state(&mut state, RecognizerState::Listening).await;
    assert_ne!(*state.borrow(), RecognizerState::Stopped);

    handle.close().await;
}

#[tokio::test(start_paused = true)]
async fn host_end_flushes_buffer_and_stops() {
    let backend = FakeSpeech::new();
    let (handle, mut utterances) = spawn_recognizer(&backend);
    let mut state = handle.state();

    handle.start();
    wait_state(&mut state, RecognizerState::Listening).await;

    // The host terminates before the silence timer fires
    backend.send(hypothesis("stop stopada"));
    backend.send(SessionEvent::Ended);

    wait_state(&mut state, RecognizerState::Stopped).await;
    assert_eq!(utterances.recv().await.unwrap(), "stop stopada");
    assert_eq!(backend.session_count(), 1);

    handle.close().await;
}

#[tokio::test(start_paused = true)]
async fn stop_during_restart_does_not_rearm() {
    let backend = FakeSpeech::new();
    let (handle, mut utterances) = spawn_recognizer(&backend);
    let mut state = handle.state();

    handle.start();
    wait_state(&mut state, RecognizerState::Listening).await;

    backend.send(hypothesis("halo dunia"));
    let _ = utterances.recv().await.unwrap();
    wait_state(&mut state, RecognizerState::Restarting).await;

    // Stop lands while the restart delay is pending
    handle.stop();
    wait_state(&mut state, RecognizerState::Stopped).await;

    // The in-flight restart observed the flag: no replacement session
    tokio::time::sleep(Duration::from_millis(3000)).await;
    assert_eq!(backend.session_count(), 1);

    handle.close().await;
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent() {
    let backend = FakeSpeech::new();
    let (handle, _utterances) = spawn_recognizer(&backend);
    let mut state = handle.state();

    handle.start();
    wait_state(&mut state, RecognizerState::Listening).await;

    handle.stop();
    handle.stop();
    wait_state(&mut state, RecognizerState::Stopped).await;
    assert!(backend.is_stopped(0));

    handle.close().await;
}

#[tokio::test(start_paused = true)]
async fn other_errors_restart_while_listening() {
    let backend = FakeSpeech::new();
    let (handle, _utterances) = spawn_recognizer(&backend);
    let mut state = handle.state();

    handle.start();
    wait_state(&mut state, RecognizerState::Listening).await;

    backend.send(SessionEvent::Error(SessionErrorKind::Other(
        "network".to_string(),
    )));
    wait_state(&mut state, RecognizerState::Restarting).await;
    wait_state(&mut state, RecognizerState::Listening).await;
    assert_eq!(backend.session_count(), 2);

    handle.close().await;
}

#[tokio::test(start_paused = true)]
async fn session_creation_failure_is_fatal() {
    let backend = FakeSpeech::new();
    backend.fail_creation();
    let (handle, _utterances) = spawn_recognizer(&backend);
    let mut state = handle.state();

    handle.start();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(*state.borrow(), RecognizerState::Stopped);
    assert_eq!(backend.session_count(), 0);

    handle.close().await;
}
