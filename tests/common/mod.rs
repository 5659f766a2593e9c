//! Shared test doubles
//!
//! Fake playback and speech backends so the pipeline tests run without audio
//! hardware or a network.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use cadence_player::{Error, Result, SessionConfig, SessionEvent, SpeechBackend, SpeechSession};

/// Playback backend that records plays and supports blocking-until-halt
pub struct FakePlayback {
    /// Payloads in the order play() was entered
    pub plays: Mutex<Vec<Vec<u8>>>,
    /// Number of halt() calls
    pub halts: AtomicUsize,
    /// Standing halt flag, cleared only by clear_halt()
    halted: AtomicBool,
    /// Plays that were pre-empted by a standing halt
    preempted: AtomicUsize,
    /// Number of clear_halt() calls
    clear_halts: AtomicUsize,
    /// When set, play() suspends until halted (simulates a long clip)
    blocking: AtomicBool,
    /// Payloads that should fail playback
    failing: Mutex<Vec<Vec<u8>>>,
    started_tx: mpsc::UnboundedSender<Vec<u8>>,
    halt_notify: Notify,
}

impl FakePlayback {
    /// Returns the backend and a channel reporting each play() entry
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (started_tx, started_rx) = mpsc::unbounded_channel();
        let backend = Arc::new(Self {
            plays: Mutex::new(Vec::new()),
            halts: AtomicUsize::new(0),
            halted: AtomicBool::new(false),
            preempted: AtomicUsize::new(0),
            clear_halts: AtomicUsize::new(0),
            blocking: AtomicBool::new(false),
            failing: Mutex::new(Vec::new()),
            started_tx,
            halt_notify: Notify::new(),
        });
        (backend, started_rx)
    }

    /// Make every play() suspend until halt()
    pub fn set_blocking(&self, blocking: bool) {
        self.blocking.store(blocking, Ordering::SeqCst);
    }

    /// Make play() fail for the given payload
    pub fn fail_payload(&self, payload: Vec<u8>) {
        self.failing.lock().unwrap().push(payload);
    }

    /// Payloads played so far
    pub fn played(&self) -> Vec<Vec<u8>> {
        self.plays.lock().unwrap().clone()
    }

    /// Plays that returned immediately because a halt was standing
    pub fn preempted(&self) -> usize {
        self.preempted.load(Ordering::SeqCst)
    }

    /// Number of clear_halt() calls
    pub fn clear_halts(&self) -> usize {
        self.clear_halts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl cadence_player::PlaybackBackend for FakePlayback {
    async fn play(&self, payload: &[u8], _mime: &str) -> Result<()> {
        // A halt raised at or before this clip's turn pre-empts it
        if self.halted.load(Ordering::SeqCst) {
            self.preempted.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }

        self.plays.lock().unwrap().push(payload.to_vec());
        let _ = self.started_tx.send(payload.to_vec());

        if self.failing.lock().unwrap().iter().any(|p| p == payload) {
            return Err(Error::Playback("scripted failure".to_string()));
        }
        if self.blocking.load(Ordering::SeqCst) {
            self.halt_notify.notified().await;
        }
        Ok(())
    }

    fn halt(&self) {
        self.halts.fetch_add(1, Ordering::SeqCst);
        self.halted.store(true, Ordering::SeqCst);
        self.halt_notify.notify_one();
    }

    fn clear_halt(&self) {
        self.clear_halts.fetch_add(1, Ordering::SeqCst);
        self.halted.store(false, Ordering::SeqCst);
    }
}

/// One session created by [`FakeSpeech`]
pub struct FakeSessionRecord {
    /// Sender paired with the receiver the recognizer listens on
    pub events_tx: mpsc::UnboundedSender<SessionEvent>,
    /// Set once the recognizer stops the session
    pub stopped: Arc<AtomicBool>,
    /// Configuration the session was created with
    pub config: SessionConfig,
}

/// Speech backend whose sessions are driven by the test
#[derive(Default)]
pub struct FakeSpeech {
    sessions: Mutex<Vec<FakeSessionRecord>>,
    fail_create: AtomicBool,
}

impl FakeSpeech {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make subsequent create_session calls fail
    pub fn fail_creation(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    /// Number of sessions created so far
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Inject an event into the most recently created session
    pub fn send(&self, event: SessionEvent) {
        let sessions = self.sessions.lock().unwrap();
        let session = sessions.last().expect("no session created yet");
        let _ = session.events_tx.send(event);
    }

    /// Whether session `index` has been stopped by the recognizer
    pub fn is_stopped(&self, index: usize) -> bool {
        self.sessions.lock().unwrap()[index]
            .stopped
            .load(Ordering::SeqCst)
    }

    /// Configuration of session `index`
    pub fn config(&self, index: usize) -> SessionConfig {
        self.sessions.lock().unwrap()[index].config.clone()
    }
}

impl SpeechBackend for FakeSpeech {
    fn create_session(
        &self,
        config: &SessionConfig,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Box<dyn SpeechSession>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::Recognition("scripted creation failure".to_string()));
        }

        let stopped = Arc::new(AtomicBool::new(false));
        self.sessions.lock().unwrap().push(FakeSessionRecord {
            events_tx: events_tx.clone(),
            stopped: Arc::clone(&stopped),
            config: config.clone(),
        });
        Ok(Box::new(FakeSession { stopped, events_tx }))
    }
}

struct FakeSession {
    stopped: Arc<AtomicBool>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SpeechSession for FakeSession {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        // Host engines report their end after an explicit stop
        let _ = self.events_tx.send(SessionEvent::Ended);
    }
}
