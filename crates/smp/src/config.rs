use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

pub use audio_player::config::PlaybackConfig;
use audio_player::device;

use crate::cli::Args;

/// Config file looked up under `$HOME/.config` when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "smp.conf";

#[derive(Clone, Debug)]
pub struct PlayerConfig {
    pub config_path: PathBuf,
    /// Substituted for a leading `~` in track paths.
    pub home: PathBuf,
    pub device: Option<String>,
    pub playback: PlaybackConfig,
}

impl PlayerConfig {
    /// Resolve against the process environment.
    pub fn from_env(args: &Args) -> Result<Self> {
        Self::resolve(args, std::env::var_os("HOME"))
    }

    pub fn resolve(args: &Args, home: Option<OsString>) -> Result<Self> {
        let home = home
            .filter(|h| !h.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("HOME is not set"))?;
        let config_path = args
            .config
            .clone()
            .unwrap_or_else(|| default_config_path(&home));
        Ok(Self {
            config_path,
            home,
            device: device::normalize_device_name(args.device.clone()),
            playback: args.playback(),
        })
    }

    /// The whole config file.
    pub fn read_config_text(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.config_path)
            .with_context(|| format!("could not read config '{}'", self.config_path.display()))
    }
}

pub fn default_config_path(home: &Path) -> PathBuf {
    home.join(".config").join(CONFIG_FILE_NAME)
}
