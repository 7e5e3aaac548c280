//! Load the whole file, push it through the sink, drain.

use std::path::Path;

use anyhow::{Context, Result};
use cpal::traits::DeviceTrait;

use audio_player::device;
use audio_player::sink::{PcmSink, SampleFormat, SampleSpec};

use crate::config::RawPlayConfig;

/// The only input format `smm` understands.
pub const RAW_SPEC: SampleSpec = SampleSpec {
    format: SampleFormat::S16Le,
    rate: 44_100,
    channels: 2,
};

pub fn list_devices() -> Result<()> {
    let host = cpal::default_host();
    device::list_devices(&host).context("[Audio] list output devices")
}

pub fn run_play(config: RawPlayConfig) -> Result<()> {
    let pcm = read_pcm(&config.path)?;

    let host = cpal::default_host();
    let device = device::pick_device(&host, config.device.as_deref())
        .context("[Audio] could not open output device")?;
    tracing::info!(device = %device.description()?, "output device");
    tracing::info!(
        path = %config.path.display(),
        bytes = pcm.len(),
        duration_ms = RAW_SPEC.duration_ms(pcm.len()),
        "playing"
    );

    let mut sink = PcmSink::open(&device, RAW_SPEC, &config.playback)
        .context("[Audio] could not open sink")?;
    sink.write(&pcm).context("[Audio] could not write samples")?;
    sink.drain().context("[Audio] could not drain sink")?;
    tracing::info!("done");
    Ok(())
}

fn read_pcm(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("could not read file '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn raw_spec_is_cd_audio() {
        assert_eq!(RAW_SPEC.bytes_per_frame(), 4);
        assert_eq!(RAW_SPEC.duration_ms(44_100 * 4 * 3), 3000);
    }

    #[test]
    fn read_pcm_returns_file_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[1, 2, 3, 4]).unwrap();
        assert_eq!(read_pcm(file.path()).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn read_pcm_names_missing_path() {
        let err = read_pcm(Path::new("/no/such/file.raw")).unwrap_err();
        assert!(err.to_string().contains("'/no/such/file.raw'"));
    }
}
