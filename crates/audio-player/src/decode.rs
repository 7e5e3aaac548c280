//! Decoding stage.
//!
//! Uses Symphonia to probe a file, pick its first decodable audio track and stream
//! decoded interleaved `f32` samples into a bounded [`SampleQueue`] from a background
//! thread.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, CodecParameters, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::queue::{SampleQueue, capacity_for};

/// What probing learned about a source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceInfo {
    pub rate: u32,
    pub channels: usize,
    pub duration_ms: Option<u64>,
    /// Codec label (best-effort).
    pub codec: Option<String>,
}

/// A probed file, ready to decode.
struct OpenSource {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    info: SourceInfo,
}

/// Probe `path` and make sure a decoder exists for its audio track.
///
/// Nothing is decoded; this is the check behind loading a track.
pub fn probe_file(path: &Path) -> Result<SourceInfo> {
    open_source(path).map(|src| src.info)
}

/// Start a decoder thread for `path`.
///
/// Returns the source description and the queue the thread fills. The queue is closed on
/// end of stream or error; closing it from the consumer side stops the thread.
pub fn start_streaming_decode(
    path: &Path,
    buffer_seconds: f32,
) -> Result<(SourceInfo, Arc<SampleQueue>)> {
    let src = open_source(path)?;
    let info = src.info.clone();
    let queue = Arc::new(SampleQueue::new(
        info.channels,
        capacity_for(info.rate, info.channels, buffer_seconds),
    ));

    let queue_for_thread = queue.clone();
    let label = path.display().to_string();
    thread::spawn(move || {
        if let Err(e) = decode_loop(src, &queue_for_thread) {
            tracing::error!(path = %label, "decoder error: {e:#}");
        }
        queue_for_thread.close();
    });

    Ok((info, queue))
}

fn open_source(path: &Path) -> Result<OpenSource> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("unrecognised audio format: {}", path.display()))?;
    let format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow!("no audio track in {}", path.display()))?;
    let info = source_info(&track.codec_params)?;
    let track_id = track.id;
    let decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .with_context(|| format!("unsupported codec in {}", path.display()))?;

    Ok(OpenSource {
        format,
        decoder,
        track_id,
        info,
    })
}

fn source_info(params: &CodecParameters) -> Result<SourceInfo> {
    let rate = params
        .sample_rate
        .ok_or_else(|| anyhow!("unknown sample rate"))?;
    let channels = params
        .channels
        .ok_or_else(|| anyhow!("unknown channel layout"))?
        .count();
    Ok(SourceInfo {
        rate,
        channels,
        duration_ms: duration_ms_from_codec_params(params),
        codec: codec_name_from_params(params),
    })
}

fn decode_loop(mut src: OpenSource, queue: &SampleQueue) -> Result<()> {
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match src.format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e).context("read packet"),
        };
        if packet.track_id() != src.track_id {
            continue;
        }

        let decoded = match src.decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!("skipping undecodable packet: {e}");
                continue;
            }
            Err(e) => return Err(e).context("decode packet"),
        };

        let frames = decoded.capacity() as u64;
        let needed = frames as usize * decoded.spec().channels.count();
        if sample_buf.as_ref().map_or(true, |b| b.capacity() < needed) {
            sample_buf = Some(SampleBuffer::<f32>::new(frames, *decoded.spec()));
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        if !queue.push_blocking(buf.samples()) {
            // Consumer closed the queue: playback was halted.
            break;
        }
    }
    Ok(())
}

/// Duration in milliseconds, when the container reports total frames.
fn duration_ms_from_codec_params(params: &CodecParameters) -> Option<u64> {
    let frames = params.n_frames?;
    let rate = u64::from(params.sample_rate?);
    if rate == 0 {
        return None;
    }
    Some(frames.saturating_mul(1000) / rate)
}

fn codec_name_from_params(params: &CodecParameters) -> Option<String> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_ALAC => "ALAC",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM_S24",
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM_F32",
        _ => return None,
    };
    Some(name.to_string())
}
