//! `smm`: play a raw PCM file (S16LE, 44100 Hz, stereo) on an output device.
//!
//! The file is read into memory, written through [`audio_player::sink::PcmSink`] and
//! drained before exit. Any failure prints `Error: …` and exits with status 1.

mod cli;
mod config;
mod runtime;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::config::RawPlayConfig;

fn main() -> Result<()> {
    let args = cli::parse_args();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,smm=info")),
        )
        .init();

    if args.list_devices {
        return runtime::list_devices();
    }
    runtime::run_play(RawPlayConfig::try_from(args)?)
}
