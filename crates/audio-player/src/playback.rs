//! Output stage: the cpal stream and its real-time callback.
//!
//! The callback keeps a small local buffer, refills it from a [`SampleQueue`] without
//! blocking, maps source channels onto the device layout and converts `f32` to the
//! device sample format. Underruns and pause both produce silence.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use anyhow::{Result, anyhow};
use cpal::traits::DeviceTrait;

use crate::queue::{SampleQueue, Take};

/// Shared knobs and counters for one output stream.
#[derive(Clone, Debug)]
pub struct OutputOptions {
    /// Max frames pulled from the queue per refill.
    pub refill_max_frames: usize,
    /// While `true` the callback writes silence and leaves the queue untouched.
    pub paused: Arc<AtomicBool>,
    /// Frames actually taken from the queue and written out.
    pub played_frames: Arc<AtomicU64>,
}

pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<SampleQueue>,
    opts: OutputOptions,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, queue, opts),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, queue, opts),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, queue, opts),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, queue, opts),
        other => Err(anyhow!("unsupported output sample format: {other:?}")),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<SampleQueue>,
    opts: OutputOptions,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
{
    let dst_channels = usize::from(config.channels).max(1);
    let queue = queue.clone();
    let refill = opts.refill_max_frames.max(1);
    let mut local = LocalBuffer::new(queue.channels());
    let silence = <T as cpal::Sample>::from_sample::<f32>(0.0);

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            if opts.paused.load(Ordering::Relaxed) {
                data.fill(silence);
                return;
            }

            let mut written = 0u64;
            for frame in data.chunks_mut(dst_channels) {
                let Some(src) = local.next_frame(&queue, refill) else {
                    frame.fill(silence);
                    continue;
                };
                for (ch, out) in frame.iter_mut().enumerate() {
                    *out = <T as cpal::Sample>::from_sample::<f32>(map_channel(
                        src,
                        dst_channels,
                        ch,
                    ));
                }
                written += 1;
            }
            if written > 0 {
                opts.played_frames.fetch_add(written, Ordering::Relaxed);
            }
        },
        |err| tracing::warn!("[Audio] stream error: {err}"),
        None,
    )?;

    Ok(stream)
}

/// Samples already taken from the queue but not yet written.
struct LocalBuffer {
    channels: usize,
    samples: Vec<f32>,
    pos: usize,
}

impl LocalBuffer {
    fn new(channels: usize) -> Self {
        Self {
            channels: channels.max(1),
            samples: Vec::new(),
            pos: 0,
        }
    }

    fn next_frame(&mut self, queue: &SampleQueue, refill: usize) -> Option<&[f32]> {
        if self.pos + self.channels > self.samples.len() {
            self.samples = queue.take(Take::Ready(refill))?;
            self.pos = 0;
        }
        let frame = &self.samples[self.pos..self.pos + self.channels];
        self.pos += self.channels;
        Some(frame)
    }
}

/// Pick the source sample for output channel `dst_ch`.
///
/// Mono is duplicated, stereo to mono is averaged, anything else clamps to the last
/// available source channel.
fn map_channel(src: &[f32], dst_channels: usize, dst_ch: usize) -> f32 {
    match (src.len(), dst_channels) {
        (2, 1) => 0.5 * (src[0] + src[1]),
        (0, _) => 0.0,
        (n, _) => src[dst_ch.min(n - 1)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_channel_duplicates_mono() {
        assert_eq!(map_channel(&[0.5], 2, 0), 0.5);
        assert_eq!(map_channel(&[0.5], 2, 1), 0.5);
    }

    #[test]
    fn map_channel_downmixes_stereo_to_mono() {
        assert_eq!(map_channel(&[1.0, 0.0], 1, 0), 0.5);
    }

    #[test]
    fn map_channel_passes_stereo_and_clamps_wider_outputs() {
        assert_eq!(map_channel(&[0.1, 0.2], 2, 1), 0.2);
        assert_eq!(map_channel(&[0.1, 0.2], 6, 4), 0.2);
        assert_eq!(map_channel(&[], 2, 0), 0.0);
    }

    #[test]
    fn local_buffer_refills_frame_by_frame() {
        let q = SampleQueue::new(2, 16);
        q.push_blocking(&[1.0, 2.0, 3.0, 4.0]);
        let mut local = LocalBuffer::new(2);
        assert_eq!(local.next_frame(&q, 1), Some(&[1.0, 2.0][..]));
        assert_eq!(local.next_frame(&q, 1), Some(&[3.0, 4.0][..]));
        assert_eq!(local.next_frame(&q, 1), None);
    }
}
