//! Audio collaborators for the `smm` and `smp` players.
//!
//! - [`sink::PcmSink`] plays raw PCM bytes and drains on request.
//! - [`mixer::Mixer`] decodes one track at a time and reports when it finishes.
//!
//! Both run on the same stages: a bounded [`queue::SampleQueue`], an optional rubato
//! resampler and a cpal output stream.

pub mod config;
pub mod decode;
pub mod device;
pub mod mixer;
pub mod pipeline;
pub mod playback;
pub mod queue;
pub mod resample;
pub mod sink;
