use super::defaults::{
    MAX_DEVICE_NAME_BYTES, MAX_PROCESSOR_NAME_BYTES, MAX_METER_INTERVAL_MS,
    MAX_STREAM_CAPACITY_MS, MAX_TURN_HANGOVER_MS, MIN_METER_INTERVAL_MS, MIN_STREAM_CAPACITY_MS,
    MIN_TURN_HANGOVER_MS,
};
use super::AppConfig;
use crate::gate::{ATTACK_RANGE_S, RELEASE_RANGE_S, THRESHOLD_RANGE_DB};
use anyhow::{bail, Result};
use std::ops::RangeInclusive;
use std::path::Path;

impl AppConfig {
    /// Check CLI values and normalize names.
    pub fn validate(&mut self) -> Result<()> {
        check_range("--threshold-db", "dB", self.threshold_db, &THRESHOLD_RANGE_DB)?;
        check_range("--attack-s", "s", self.attack_s, &ATTACK_RANGE_S)?;
        check_range("--release-s", "s", self.release_s, &RELEASE_RANGE_S)?;

        if !(MIN_STREAM_CAPACITY_MS..=MAX_STREAM_CAPACITY_MS).contains(&self.stream_capacity_ms) {
            bail!(
                "--stream-capacity-ms must be between {MIN_STREAM_CAPACITY_MS} and {MAX_STREAM_CAPACITY_MS} ms, got {}",
                self.stream_capacity_ms
            );
        }
        if !(MIN_METER_INTERVAL_MS..=MAX_METER_INTERVAL_MS).contains(&self.meter_interval_ms) {
            bail!(
                "--meter-interval-ms must be between {MIN_METER_INTERVAL_MS} and {MAX_METER_INTERVAL_MS} ms, got {}",
                self.meter_interval_ms
            );
        }
        if !(-120.0..=0.0).contains(&self.turn_threshold_db) {
            bail!(
                "--turn-threshold-db must be between -120.0 and 0.0 dB, got {}",
                self.turn_threshold_db
            );
        }
        if !(MIN_TURN_HANGOVER_MS..=MAX_TURN_HANGOVER_MS).contains(&self.turn_hangover_ms) {
            bail!(
                "--turn-hangover-ms must be between {MIN_TURN_HANGOVER_MS} and {MAX_TURN_HANGOVER_MS} ms, got {}",
                self.turn_hangover_ms
            );
        }

        self.processor = self.processor.trim().to_string();
        if self.processor.is_empty()
            || self.processor.len() > MAX_PROCESSOR_NAME_BYTES
            || !self
                .processor
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        {
            bail!(
                "--processor must be 1-{MAX_PROCESSOR_NAME_BYTES} characters of letters, digits, '-' or '_'"
            );
        }

        if let Some(device) = self.input_device.as_mut() {
            let trimmed = device.trim();
            if trimmed.is_empty()
                || trimmed.len() > MAX_DEVICE_NAME_BYTES
                || trimmed.chars().any(char::is_control)
            {
                bail!(
                    "--input-device must be 1-{MAX_DEVICE_NAME_BYTES} bytes with no control characters"
                );
            }
            *device = trimmed.to_string();
        }

        if let Some(path) = self.settings_file.as_deref() {
            check_extension("--settings-file", path, "json")?;
        }
        if let Some(path) = self.record_wav.as_deref() {
            #[cfg(not(feature = "wav-record"))]
            {
                let _ = path;
                bail!("--record-wav requires building with the 'wav-record' feature");
            }
            #[cfg(feature = "wav-record")]
            check_extension("--record-wav", path, "wav")?;
        }

        Ok(())
    }
}

fn check_range(flag: &str, unit: &str, value: f32, range: &RangeInclusive<f32>) -> Result<()> {
    if !value.is_finite() || !range.contains(&value) {
        bail!(
            "{flag} must be between {} and {} {unit}, got {value}",
            range.start(),
            range.end()
        );
    }
    Ok(())
}

fn check_extension(flag: &str, path: &Path, expected: &str) -> Result<()> {
    let matches = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(expected));
    if !matches {
        bail!("{flag} must point to a .{expected} file, got {}", path.display());
    }
    Ok(())
}
