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

/// Play a named playlist from ~/.config/smp.conf.
///
/// Keys while playing: p pause, r resume, space toggle, q / Esc / Ctrl-C quit.
#[derive(Parser, Debug)]
#[command(name = "smp", version = VERSION)]
pub struct Args {
    /// Playlist (section name) to play
    #[arg(required_unless_present_any = ["list", "list_devices"])]
    pub playlist: Option<String>,

    /// Config file to read instead of ~/.config/smp.conf
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// List playlists in the config file and exit
    #[arg(long)]
    pub list: bool,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Resampler input chunk size in frames (higher => more latency, lower => more overhead)
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
        Err(e) => e.exit(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlist_is_required() {
        assert!(Args::try_parse_from(["smp"]).unwrap_err().use_stderr());
    }

    #[test]
    fn list_flags_need_no_playlist() {
        assert!(Args::try_parse_from(["smp", "--list"]).unwrap().list);
        assert!(Args::try_parse_from(["smp", "--list-devices"]).unwrap().list_devices);
    }

    #[test]
    fn parses_playlist_and_overrides() {
        let args = Args::try_parse_from([
            "smp",
            "--chunk-frames",
            "512",
            "--refill-max-frames",
            "2048",
            "rock",
        ])
        .unwrap();
        assert_eq!(args.playlist.as_deref(), Some("rock"));
        assert_eq!(args.playback().chunk_frames, 512);
        assert_eq!(args.playback().refill_max_frames, 2048);
    }

    #[test]
    fn version_includes_build_stamp() {
        let err = Args::try_parse_from(["smp", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
        assert!(!err.use_stderr());
        assert!(VERSION.starts_with(env!("CARGO_PKG_VERSION")));
        assert!(VERSION.contains(env!("GIT_SHA")));
    }
}
