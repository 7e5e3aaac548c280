//! Sample-rate conversion stage.
//!
//! Runs Rubato's asynchronous sinc resampler on a background thread, reading from one
//! [`SampleQueue`] at the source rate and writing to a new one at the device rate.

use std::sync::Arc;
use std::thread;

use anyhow::{Result, anyhow};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};

use crate::queue::{SampleQueue, Take, capacity_for};

#[derive(Clone, Copy, Debug)]
pub struct ResampleConfig {
    /// Input frames per resampler call.
    pub chunk_frames: usize,
    /// Buffering target for the output queue.
    pub buffer_seconds: f32,
}

/// Spawn the resampler thread and return its output queue.
///
/// The output queue is closed once `srcq` is closed and fully consumed, or on error.
pub fn start_resampler(
    srcq: Arc<SampleQueue>,
    src_rate: u32,
    dst_rate: u32,
    cfg: ResampleConfig,
) -> Result<Arc<SampleQueue>> {
    if src_rate == 0 || dst_rate == 0 {
        return Err(anyhow!("cannot resample {src_rate} Hz -> {dst_rate} Hz"));
    }
    let channels = srcq.channels();
    let dstq = Arc::new(SampleQueue::new(
        channels,
        capacity_for(dst_rate, channels, cfg.buffer_seconds),
    ));
    let chunk_frames = cfg.chunk_frames.max(1).min(srcq.capacity_frames());
    let ratio = f64::from(dst_rate) / f64::from(src_rate);

    let dstq_thread = dstq.clone();
    thread::spawn(move || {
        if let Err(e) = resample_loop(&srcq, &dstq_thread, ratio, chunk_frames) {
            tracing::error!("[Audio] resampler error: {e:#}");
            srcq.close();
        }
        dstq_thread.close();
    });

    Ok(dstq)
}

fn resample_loop(
    srcq: &SampleQueue,
    dstq: &SampleQueue,
    ratio: f64,
    chunk_frames: usize,
) -> Result<()> {
    let channels = srcq.channels();
    let sinc_len = 128;
    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window,
    };
    let mut resampler = Async::<f32>::new_sinc(
        ratio,
        1.1,
        &params,
        chunk_frames,
        channels,
        FixedAsync::Input,
    )
    .map_err(|e| anyhow!("resampler init: {e}"))?;

    // Room for the worst-case ratio (1.1x relative headroom) plus filter delay.
    let max_out_frames = (chunk_frames as f64 * ratio * 1.1).ceil() as usize + sinc_len;
    let mut out = vec![0.0f32; channels * max_out_frames];

    // Steady state: whole chunks.
    while let Some(chunk) = srcq.take(Take::Exact(chunk_frames)) {
        let produced = process(&mut resampler, &chunk, &mut out, channels, None)?;
        if !dstq.push_blocking(&out[..produced]) {
            return Ok(());
        }
    }

    // Tail: whatever is left after the source closed.
    while let Some(tail) = srcq.take(Take::UpTo(chunk_frames)) {
        let frames = tail.len() / channels;
        let produced = process(&mut resampler, &tail, &mut out, channels, Some(frames))?;
        if produced > 0 && !dstq.push_blocking(&out[..produced]) {
            return Ok(());
        }
    }
    Ok(())
}

/// Run one resampler call; returns the number of output samples written to `out`.
fn process(
    resampler: &mut Async<f32>,
    input: &[f32],
    out: &mut [f32],
    channels: usize,
    partial_len: Option<usize>,
) -> Result<usize> {
    let in_frames = input.len() / channels;
    let out_frames = out.len() / channels;
    let input = InterleavedSlice::new(input, channels, in_frames)
        .map_err(|e| anyhow!("resampler input buffer: {e}"))?;
    let mut output = InterleavedSlice::new_mut(out, channels, out_frames)
        .map_err(|e| anyhow!("resampler output buffer: {e}"))?;
    let indexing = Indexing {
        input_offset: 0,
        output_offset: 0,
        active_channels_mask: None,
        partial_len,
    };
    let (_consumed, produced) = resampler
        .process_into_buffer(&input, &mut output, Some(&indexing))
        .map_err(|e| anyhow!("resampler process: {e}"))?;
    Ok(produced * channels)
}
