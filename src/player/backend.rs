//! Playback backend
//!
//! Abstract capability the drain loop suspends on: `play` resolves when the
//! clip ends or errors, `halt` makes an in-flight `play` return immediately
//! so a stop never waits for natural end-of-clip.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;

use crate::{Error, Result};

/// The only segment MIME type the server produces
pub const AUDIO_MIME: &str = "audio/mp3";

/// Poll interval while waiting for a clip to finish
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Drives actual audio output for the drain loop
#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    /// Play one segment, suspending until it ends, errors, or is halted
    ///
    /// A halt is a normal outcome, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Playback`] if the payload cannot be decoded or the
    /// output device fails.
    async fn play(&self, payload: &[u8], mime: &str) -> Result<()>;

    /// Stop the in-flight clip immediately; no-op when idle
    fn halt(&self);

    /// Clear a standing halt before a new drain begins
    ///
    /// Called once per drain, never between segments, so a halt raised while
    /// the drain is mid-iteration stays visible to the next `play`.
    fn clear_halt(&self) {}
}

/// Plays MP3 segments on the default output device
pub struct DeviceBackend {
    halted: Arc<AtomicBool>,
}

impl DeviceBackend {
    /// Create a backend bound to the default output device
    ///
    /// # Errors
    ///
    /// Returns [`Error::Audio`] if no output device is available
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            "playback backend initialized"
        );

        Ok(Self {
            halted: Arc::new(AtomicBool::new(false)),
        })
    }
}

#[async_trait]
impl PlaybackBackend for DeviceBackend {
    async fn play(&self, payload: &[u8], mime: &str) -> Result<()> {
        if mime != AUDIO_MIME {
            return Err(Error::Playback(format!("unsupported MIME type: {mime}")));
        }
        // A halt raised at or before this segment's turn pre-empts it
        if self.halted.load(Ordering::SeqCst) {
            tracing::debug!("halt pending, skipping clip");
            return Ok(());
        }

        let (samples, sample_rate) = decode_mp3(payload)?;
        if samples.is_empty() {
            return Ok(());
        }

        let halted = Arc::clone(&self.halted);

        // cpal streams are not Send, so the whole clip runs on a blocking
        // thread; the async caller just awaits its completion
        tokio::task::spawn_blocking(move || play_samples(&samples, sample_rate, &halted))
            .await
            .map_err(|e| Error::Playback(e.to_string()))?
    }

    fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
    }

    fn clear_halt(&self) {
        self.halted.store(false, Ordering::SeqCst);
    }
}

/// Play samples to the default output device, polling for completion or halt
fn play_samples(samples: &[f32], sample_rate: u32, halted: &AtomicBool) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device".to_string()))?;

    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        })
        .ok_or_else(|| Error::Audio(format!("no output config for {sample_rate} Hz")))?;

    let config = supported.with_sample_rate(SampleRate(sample_rate)).config();
    let channels = config.channels as usize;

    let position = Arc::new(Mutex::new(0usize));
    let finished = Arc::new(AtomicBool::new(false));
    let source = samples.to_vec();

    let position_cb = Arc::clone(&position);
    let finished_cb = Arc::clone(&finished);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut pos = position_cb.lock().expect("position lock poisoned");
                for frame in data.chunks_mut(channels) {
                    let sample = if *pos < source.len() {
                        let s = source[*pos];
                        *pos += 1;
                        s
                    } else {
                        finished_cb.store(true, Ordering::SeqCst);
                        0.0
                    };
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "output stream error");
            },
            None,
        )
        .map_err(|e| Error::Playback(e.to_string()))?;

    stream.play().map_err(|e| Error::Playback(e.to_string()))?;

    let duration_ms = (samples.len() as u64 * 1000) / u64::from(sample_rate);
    let timeout = Duration::from_millis(duration_ms + 500);
    let start = std::time::Instant::now();

    while !finished.load(Ordering::SeqCst) && !halted.load(Ordering::SeqCst) {
        if start.elapsed() > timeout {
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    let was_halted = halted.load(Ordering::SeqCst);
    drop(stream);
    tracing::debug!(samples = samples.len(), halted = was_halted, "clip finished");
    Ok(())
}

/// Decode MP3 bytes into mono f32 samples plus the stream's sample rate
fn decode_mp3(payload: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(payload));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = frame.sample_rate as u32;
                }
                if frame.channels == 2 {
                    // Stereo: average channels down to mono
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        (left + right) / 2.0
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Playback(format!("MP3 decode error: {e}"))),
        }
    }

    if sample_rate == 0 {
        return Err(Error::Playback("no decodable MP3 frames".to_string()));
    }
    Ok((samples, sample_rate))
}
