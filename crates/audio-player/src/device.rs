//! Output device discovery and selection.
//!
//! Thin wrappers around cpal for listing output devices, picking one by name, and
//! choosing a stream config close to a source's sample rate.

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};

/// Pick the first output device whose name contains `needle` (case-insensitive),
/// or the host default when `needle` is `None`.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    if let Some(needle) = needle {
        let mut devices = host.output_devices().context("enumerate output devices")?;
        return devices
            .find(|d| {
                d.description()
                    .map(|desc| matches_device_name(&desc.name(), needle))
                    .unwrap_or(false)
            })
            .ok_or_else(|| anyhow!("no output device matched: {needle}"));
    }

    host.default_output_device()
        .ok_or_else(|| anyhow!("no default output device"))
}

/// Trimmed device name, or `None` when blank.
pub fn normalize_device_name(device: Option<String>) -> Option<String> {
    device.and_then(|name| {
        let trimmed = name.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Choose the supported output config closest to `target_rate`.
///
/// Prefers the highest rate not above the target, then the lowest one above it, and
/// among equal rates the richer sample format.
pub fn pick_output_config(
    device: &cpal::Device,
    target_rate: u32,
) -> Result<cpal::SupportedStreamConfig> {
    let mut best: Option<(Candidate, cpal::SupportedStreamConfig)> = None;

    for range in device
        .supported_output_configs()
        .context("query supported output configs")?
    {
        // The stream builder only handles ranked formats.
        let Some(format_rank) = sample_format_rank(range.sample_format()) else {
            tracing::debug!(format = ?range.sample_format(), "skipping unsupported sample format");
            continue;
        };
        let rate = clamp_rate(range.min_sample_rate(), range.max_sample_rate(), target_rate);
        let candidate = Candidate {
            at_or_below: rate <= target_rate,
            rate,
            format_rank,
        };
        if best.as_ref().is_none_or(|(b, _)| candidate.beats(b)) {
            best = Some((candidate, range.with_sample_rate(rate)));
        }
    }

    best.map(|(_, cfg)| cfg)
        .ok_or_else(|| anyhow!("device reports no usable output configs"))
}

/// A fixed buffer size when the device advertises a range, capped to keep latency sane.
pub fn pick_buffer_size(config: &cpal::SupportedStreamConfig) -> Option<cpal::BufferSize> {
    const MAX_FRAMES: u32 = 16_384;
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            Some(cpal::BufferSize::Fixed((*max).min(MAX_FRAMES).max(*min)))
        }
        cpal::SupportedBufferSize::Unknown => None,
    }
}

/// Print output devices to stdout for `--list-devices`.
pub fn list_devices(host: &cpal::Host) -> Result<()> {
    let devices = host.output_devices().context("enumerate output devices")?;
    for (i, d) in devices.enumerate() {
        println!("#{i}: {}", d.description()?);
    }
    Ok(())
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    at_or_below: bool,
    rate: u32,
    format_rank: u8,
}

impl Candidate {
    fn beats(&self, other: &Candidate) -> bool {
        if self.at_or_below != other.at_or_below {
            return self.at_or_below;
        }
        if self.rate != other.rate {
            // Below the target, closer means higher; above it, closer means lower.
            return if self.at_or_below {
                self.rate > other.rate
            } else {
                self.rate < other.rate
            };
        }
        self.format_rank < other.format_rank
    }
}

fn clamp_rate(min: u32, max: u32, target: u32) -> u32 {
    target.clamp(min, max.max(min))
}

/// Preference order among formats the stream builder can drive; `None` for the rest.
fn sample_format_rank(format: cpal::SampleFormat) -> Option<u8> {
    match format {
        cpal::SampleFormat::F32 => Some(0),
        cpal::SampleFormat::I32 => Some(1),
        cpal::SampleFormat::I16 => Some(2),
        cpal::SampleFormat::U16 => Some(3),
        _ => None,
    }
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    !needle.is_empty() && name.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(at_or_below: bool, rate: u32, format_rank: u8) -> Candidate {
        Candidate {
            at_or_below,
            rate,
            format_rank,
        }
    }

    #[test]
    fn matches_device_name_is_case_insensitive() {
        assert!(matches_device_name("USB DAC", "dac"));
        assert!(matches_device_name("usb dac", " USB "));
        assert!(!matches_device_name("USB DAC", "speaker"));
        assert!(!matches_device_name("USB DAC", "  "));
    }

    #[test]
    fn normalize_device_name_trims_and_drops_blank() {
        assert_eq!(normalize_device_name(None), None);
        assert_eq!(normalize_device_name(Some("  ".to_string())), None);
        assert_eq!(
            normalize_device_name(Some("  USB  DAC ".to_string())),
            Some("USB  DAC".to_string())
        );
    }

    #[test]
    fn clamp_rate_keeps_target_in_range() {
        assert_eq!(clamp_rate(8_000, 96_000, 44_100), 44_100);
        assert_eq!(clamp_rate(48_000, 96_000, 44_100), 48_000);
        assert_eq!(clamp_rate(8_000, 22_050, 44_100), 22_050);
    }

    #[test]
    fn candidate_prefers_rates_at_or_below_target() {
        assert!(candidate(true, 22_050, 0).beats(&candidate(false, 48_000, 0)));
        assert!(!candidate(false, 48_000, 0).beats(&candidate(true, 22_050, 0)));
    }

    #[test]
    fn candidate_prefers_closest_rate() {
        assert!(candidate(true, 44_100, 2).beats(&candidate(true, 22_050, 2)));
        assert!(candidate(false, 48_000, 2).beats(&candidate(false, 96_000, 2)));
    }

    #[test]
    fn candidate_breaks_ties_by_format() {
        assert!(candidate(true, 44_100, 0).beats(&candidate(true, 44_100, 2)));
        assert!(!candidate(true, 44_100, 2).beats(&candidate(true, 44_100, 2)));
    }

    #[test]
    fn sample_format_rank_prefers_float() {
        assert_eq!(sample_format_rank(cpal::SampleFormat::F32), Some(0));
        assert!(sample_format_rank(cpal::SampleFormat::I32) < sample_format_rank(cpal::SampleFormat::I16));
    }

    #[test]
    fn sample_format_rank_rejects_unbuildable_formats() {
        assert_eq!(sample_format_rank(cpal::SampleFormat::F64), None);
        assert_eq!(sample_format_rank(cpal::SampleFormat::I8), None);
        assert_eq!(sample_format_rank(cpal::SampleFormat::U32), None);
    }
}
