//! Blocking PCM sink.
//!
//! Accepts raw PCM bytes in a declared [`SampleSpec`] and plays them on an output
//! device. [`PcmSink::write`] blocks while the stage queues are full, so writing a
//! whole file plays it in real time; [`PcmSink::drain`] blocks until the device has
//! played the last sample.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Result, bail};

use crate::config::PlaybackConfig;
use crate::pipeline::OutputSession;
use crate::queue::{SampleQueue, capacity_for};

/// Frames converted per push into the queue.
const WRITE_CHUNK_FRAMES: usize = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    /// Signed 16-bit little-endian.
    S16Le,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::S16Le => 2,
        }
    }
}

/// Layout of the raw bytes handed to a [`PcmSink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleSpec {
    pub format: SampleFormat,
    pub rate: u32,
    pub channels: u16,
}

impl SampleSpec {
    pub fn bytes_per_frame(&self) -> usize {
        self.format.bytes_per_sample() * usize::from(self.channels)
    }

    /// Playback time of `bytes` bytes, rounded down to whole milliseconds.
    pub fn duration_ms(&self, bytes: usize) -> u64 {
        let frame = self.bytes_per_frame();
        if frame == 0 || self.rate == 0 {
            return 0;
        }
        (bytes / frame) as u64 * 1000 / u64::from(self.rate)
    }
}

pub struct PcmSink {
    spec: SampleSpec,
    session: OutputSession,
    // Low byte of a sample split across two writes.
    carry: Option<u8>,
    scratch: Vec<f32>,
}

impl PcmSink {
    pub fn open(device: &cpal::Device, spec: SampleSpec, playback: &PlaybackConfig) -> Result<Self> {
        if spec.channels == 0 || spec.rate == 0 {
            bail!("invalid sample spec: {spec:?}");
        }
        let channels = usize::from(spec.channels);
        let queue = Arc::new(SampleQueue::new(
            channels,
            capacity_for(spec.rate, channels, playback.buffer_seconds),
        ));
        let session = OutputSession::start(
            device,
            playback,
            spec.rate,
            queue,
            Arc::new(AtomicBool::new(false)),
        )?;
        tracing::debug!(?spec, "pcm sink open");

        Ok(Self {
            spec,
            session,
            carry: None,
            scratch: Vec::with_capacity(WRITE_CHUNK_FRAMES * channels),
        })
    }

    /// Queue `bytes` for playback, blocking while the queues are full.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let mut bytes = bytes;
        if let (Some(lo), Some((&hi, rest))) = (self.carry, bytes.split_first()) {
            self.scratch.clear();
            self.scratch.push(s16le_to_f32([lo, hi]));
            self.push_scratch()?;
            self.carry = None;
            bytes = rest;
        }

        let chunk_bytes = WRITE_CHUNK_FRAMES * self.spec.bytes_per_frame();
        for chunk in bytes.chunks(chunk_bytes) {
            self.carry = decode_s16le(chunk, &mut self.scratch);
            self.push_scratch()?;
        }
        Ok(())
    }

    /// Close the stream and block until everything written has been played.
    pub fn drain(self) -> Result<()> {
        if self.carry.is_some() {
            tracing::debug!("dropping trailing odd byte");
        }
        self.session.input().close();
        self.session.wait();
        tracing::debug!(elapsed_ms = self.session.elapsed_ms(), "pcm sink drained");
        Ok(())
    }

    fn push_scratch(&mut self) -> Result<()> {
        if !self.session.input().push_blocking(&self.scratch) {
            bail!("output stream closed while writing");
        }
        Ok(())
    }
}

fn s16le_to_f32(bytes: [u8; 2]) -> f32 {
    f32::from(i16::from_le_bytes(bytes)) / 32_768.0
}

/// Convert whole samples from `bytes` into `out` (cleared first).
///
/// Returns the trailing byte when `bytes` has odd length.
fn decode_s16le(bytes: &[u8], out: &mut Vec<f32>) -> Option<u8> {
    out.clear();
    let samples = bytes.chunks_exact(2);
    let rest = samples.remainder().first().copied();
    out.extend(samples.map(|s| s16le_to_f32([s[0], s[1]])));
    rest
}
