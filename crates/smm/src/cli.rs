use std::path::PathBuf;

use clap::Parser;

use audio_player::config::PlaybackConfig;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

/// Play a raw PCM file: signed 16-bit little-endian, 44100 Hz, stereo.
#[derive(Parser, Debug)]
#[command(name = "smm", version = VERSION)]
pub struct Args {
    /// Raw PCM file to play
    #[arg(required_unless_present = "list_devices")]
    pub file: Option<PathBuf>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Resampler input chunk size in frames (only used when the device cannot run at 44.1 kHz)
    #[arg(long, default_value_t = 1024)]
    pub chunk_frames: usize,

    /// Playback callback refill cap (frames)
    #[arg(long, default_value_t = 4096)]
    pub refill_max_frames: usize,

    /// Queue buffer target in seconds (per stage)
    #[arg(long, default_value_t = 2.0)]
    pub buffer_seconds: f32,
}

impl Args {
    pub fn playback(&self) -> PlaybackConfig {
        PlaybackConfig {
            chunk_frames: self.chunk_frames,
            refill_max_frames: self.refill_max_frames,
            buffer_seconds: self.buffer_seconds,
        }
    }
}

/// Parse the command line. Usage errors exit with status 1.
pub fn parse_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(1);
        }
        // --help / --version
        Err(e) => e.exit(),
    }
}
