use std::path::PathBuf;

use anyhow::{Result, anyhow};

use audio_player::config::PlaybackConfig;
use audio_player::device;

use crate::cli::Args;

#[derive(Clone, Debug)]
pub struct RawPlayConfig {
    pub path: PathBuf,
    pub device: Option<String>,
    pub playback: PlaybackConfig,
}

impl TryFrom<Args> for RawPlayConfig {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> Result<Self> {
        let playback = args.playback();
        let path = args.file.ok_or_else(|| anyhow!("missing FILE argument"))?;
        Ok(Self {
            path,
            device: device::normalize_device_name(args.device),
            playback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn from_args_carries_path_and_trims_device() {
        let args = Args::try_parse_from([
            "smm",
            "--device",
            " USB ",
            "--buffer-seconds",
            "0.5",
            "a.raw",
        ])
        .unwrap();
        let config = RawPlayConfig::try_from(args).unwrap();
        assert_eq!(config.path, PathBuf::from("a.raw"));
        assert_eq!(config.device.as_deref(), Some("USB"));
        assert_eq!(config.playback.buffer_seconds, 0.5);
    }

    #[test]
    fn from_args_without_file_fails() {
        let args = Args::try_parse_from(["smm", "--list-devices"]).unwrap();
        assert!(RawPlayConfig::try_from(args).is_err());
    }
}
