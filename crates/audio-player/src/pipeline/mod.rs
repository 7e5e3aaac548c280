//! Stage wiring: optional resampler + output stream.
//!
//! An [`OutputSession`] takes a queue filled at the source rate, inserts a resampler
//! when the device runs at a different rate, and starts the cpal stream. Producers
//! keep writing into [`OutputSession::input`]; closing it marks end of stream.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use cpal::traits::StreamTrait;

use crate::config::PlaybackConfig;
use crate::device;
use crate::playback::{self, OutputOptions};
use crate::queue::SampleQueue;
use crate::resample::{self, ResampleConfig};

/// Device latency assumed when the host chooses the buffer size.
const DEFAULT_LATENCY: Duration = Duration::from_millis(200);
/// How often waiters check progress and cancellation.
const PLAYOUT_POLL: Duration = Duration::from_millis(10);
/// Give up waiting once the callback has made no progress this long while unpaused.
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// A running output stream fed from a source-rate queue.
pub struct OutputSession {
    // Held for its lifetime: dropping the stream stops playback.
    _stream: cpal::Stream,
    input: Arc<SampleQueue>,
    output: Arc<SampleQueue>,
    paused: Arc<AtomicBool>,
    played_frames: Arc<AtomicU64>,
    output_rate: u32,
    latency: Duration,
}

impl OutputSession {
    /// Open `device` for audio at `src_rate` arriving through `input`.
    pub fn start(
        device: &cpal::Device,
        playback: &PlaybackConfig,
        src_rate: u32,
        input: Arc<SampleQueue>,
        paused: Arc<AtomicBool>,
    ) -> Result<Self> {
        let config = device::pick_output_config(device, src_rate)?;
        let mut stream_config: cpal::StreamConfig = config.clone().into();
        if let Some(buf) = device::pick_buffer_size(&config) {
            stream_config.buffer_size = buf;
        }
        let output_rate = stream_config.sample_rate;
        let latency = buffer_latency(&stream_config.buffer_size, output_rate);

        let output = if src_rate == output_rate {
            tracing::debug!(rate_hz = output_rate, "resample skipped");
            input.clone()
        } else {
            tracing::info!(from_hz = src_rate, to_hz = output_rate, "resampling");
            resample::start_resampler(
                input.clone(),
                src_rate,
                output_rate,
                ResampleConfig {
                    chunk_frames: playback.chunk_frames,
                    buffer_seconds: playback.buffer_seconds,
                },
            )?
        };

        let played_frames = Arc::new(AtomicU64::new(0));
        let stream = playback::build_output_stream(
            device,
            &stream_config,
            config.sample_format(),
            &output,
            OutputOptions {
                refill_max_frames: playback.refill_max_frames,
                paused: paused.clone(),
                played_frames: played_frames.clone(),
            },
        )
        .context("build output stream")?;
        stream.play().context("start output stream")?;
        tracing::debug!(
            rate_hz = output_rate,
            channels = stream_config.channels,
            buffer_size = ?stream_config.buffer_size,
            latency_ms = latency.as_millis() as u64,
            format = ?config.sample_format(),
            "output stream started"
        );

        Ok(Self {
            _stream: stream,
            input,
            output,
            paused,
            played_frames,
            output_rate,
            latency,
        })
    }

    /// The queue producers write into.
    pub fn input(&self) -> &Arc<SampleQueue> {
        &self.input
    }

    pub fn elapsed_ms(&self) -> u64 {
        if self.output_rate == 0 {
            return 0;
        }
        self.played_frames
            .load(Ordering::Relaxed)
            .saturating_mul(1000)
            / u64::from(self.output_rate)
    }

    /// Block until the input is closed and the device has played everything queued.
    pub fn wait(&self) {
        self.wait_or_cancel(&AtomicBool::new(false));
    }

    /// Like [`OutputSession::wait`], but stops early once `cancel` is set.
    ///
    /// Returns `true` when playback reached the end.
    pub fn wait_or_cancel(&self, cancel: &AtomicBool) -> bool {
        let done = self.output.wait_drained_or_cancel(cancel)
            && wait_played(
                &self.played_frames,
                self.output.pushed_frames(),
                &self.paused,
                cancel,
            )
            && sleep_or_cancel(self.latency, cancel);
        if !done {
            self.stop();
        }
        done
    }

    /// Silence the stream and shut both queues so upstream threads exit.
    pub fn stop(&self) {
        self.paused.store(true, Ordering::Relaxed);
        self.input.close();
        self.output.close();
    }
}

/// Time the device needs to play one buffer of the given size.
fn buffer_latency(buffer_size: &cpal::BufferSize, rate: u32) -> Duration {
    match buffer_size {
        cpal::BufferSize::Fixed(frames) if rate > 0 => {
            Duration::from_secs_f64(f64::from(*frames) / f64::from(rate))
        }
        _ => DEFAULT_LATENCY,
    }
}

/// Wait until the callback has written `target` frames.
///
/// Returns `false` if cancelled. A stream that stops making progress while unpaused
/// is logged and treated as done.
fn wait_played(played: &AtomicU64, target: u64, paused: &AtomicBool, cancel: &AtomicBool) -> bool {
    let mut last = played.load(Ordering::Relaxed);
    let mut last_progress = Instant::now();
    loop {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        let now = played.load(Ordering::Relaxed);
        if now >= target {
            return true;
        }
        if now != last || paused.load(Ordering::Relaxed) {
            last = now;
            last_progress = Instant::now();
        } else if last_progress.elapsed() >= STALL_TIMEOUT {
            tracing::warn!(played = now, target, "[Audio] output stalled before end of stream");
            return true;
        }
        thread::sleep(PLAYOUT_POLL);
    }
}

fn sleep_or_cancel(total: Duration, cancel: &AtomicBool) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return true;
        }
        thread::sleep(left.min(PLAYOUT_POLL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_latency_from_fixed_size() {
        assert_eq!(
            buffer_latency(&cpal::BufferSize::Fixed(4_410), 44_100),
            Duration::from_millis(100)
        );
        assert_eq!(buffer_latency(&cpal::BufferSize::Default, 44_100), DEFAULT_LATENCY);
        assert_eq!(buffer_latency(&cpal::BufferSize::Fixed(512), 0), DEFAULT_LATENCY);
    }

    #[test]
    fn wait_played_waits_for_callback_to_catch_up() {
        let played = Arc::new(AtomicU64::new(0));
        let callback = played.clone();
        let writer = thread::spawn(move || {
            for _ in 0..5 {
                thread::sleep(Duration::from_millis(5));
                callback.fetch_add(100, Ordering::Relaxed);
            }
        });

        let paused = AtomicBool::new(false);
        let cancel = AtomicBool::new(false);
        assert!(wait_played(&played, 500, &paused, &cancel));
        assert_eq!(played.load(Ordering::Relaxed), 500);
        writer.join().unwrap();
    }

    #[test]
    fn wait_played_stops_on_cancel() {
        let played = AtomicU64::new(0);
        let paused = AtomicBool::new(true);
        let cancel = AtomicBool::new(true);
        assert!(!wait_played(&played, 10, &paused, &cancel));
    }

    #[test]
    fn wait_played_gives_up_on_stalled_stream() {
        let played = AtomicU64::new(3);
        let paused = AtomicBool::new(false);
        let cancel = AtomicBool::new(false);
        let started = Instant::now();
        assert!(wait_played(&played, 10, &paused, &cancel));
        assert!(started.elapsed() >= STALL_TIMEOUT);
    }

    #[test]
    fn sleep_or_cancel_honours_both_outcomes() {
        let cancel = AtomicBool::new(false);
        let started = Instant::now();
        assert!(sleep_or_cancel(Duration::from_millis(30), &cancel));
        assert!(started.elapsed() >= Duration::from_millis(30));

        cancel.store(true, Ordering::Relaxed);
        assert!(!sleep_or_cancel(Duration::from_secs(10), &cancel));
    }
}
