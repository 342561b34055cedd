//! System microphone capture via CPAL.
//!
//! Picks the input device, prefers a mono configuration at the device's native
//! rate, and converts every supported sample type to f32 inside the callback so
//! the graph only ever sees interleaved f32 blocks.

use super::host::{AudioHost, CaptureConstraints, CaptureDevice, InputCallback, StreamFormat};
use crate::error::GateError;
use crate::log_debug;
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig, SupportedStreamConfig};

/// Initial capacity for the integer-to-f32 conversion buffer.
const CONVERT_SCRATCH_SAMPLES: usize = 8_192;

/// CPAL-backed host. Device selection happens on each `open_capture`.
#[derive(Debug, Clone, Default)]
pub struct CpalHost {
    preferred_device: Option<String>,
}

impl CpalHost {
    /// Optionally pin a device by name so users can pick the right microphone
    /// when a laptop exposes several inputs.
    pub fn new(preferred_device: Option<&str>) -> Self {
        Self {
            preferred_device: preferred_device.map(str::to_string),
        }
    }

    /// List microphone names so the CLI can expose a human-friendly selector.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().context("no input devices available")?;
        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }

    fn select_device(&self) -> Result<cpal::Device, GateError> {
        let host = cpal::default_host();
        match self.preferred_device.as_deref() {
            Some(name) => {
                let mut devices = host.input_devices().map_err(|err| {
                    GateError::DeviceUnavailable {
                        reason: format!("no input devices available: {err}"),
                    }
                })?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| GateError::DeviceUnavailable {
                        reason: format!("input device '{name}' not found"),
                    })
            }
            None => host
                .default_input_device()
                .ok_or_else(|| GateError::DeviceUnavailable {
                    reason: "no default input device available".to_string(),
                }),
        }
    }
}

impl AudioHost for CpalHost {
    fn name(&self) -> &str {
        "cpal"
    }

    fn open_capture(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureDevice>, GateError> {
        let device = self.select_device()?;
        let supported = preferred_config(&device, constraints.channel_count)?;
        let label = device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string());

        // CPAL exposes no echo cancellation / AGC / suppression switches; the OS
        // voice-processing path applies them when it is enabled system-wide.
        log_debug(&format!(
            "capture '{label}': requested echo_cancellation={} auto_gain_control={} noise_suppression={} (not exposed by cpal)",
            constraints.echo_cancellation,
            constraints.auto_gain_control,
            constraints.noise_suppression
        ));
        log_debug(&format!(
            "capture '{label}': format={:?} sample_rate={}Hz channels={} (requested {})",
            supported.sample_format(),
            supported.sample_rate().0,
            supported.channels(),
            constraints.channel_count
        ));

        Ok(Box::new(CpalCapture {
            device,
            supported,
            label,
            stream: None,
        }))
    }
}

fn is_convertible(format: SampleFormat) -> bool {
    matches!(
        format,
        SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16
    )
}

/// Prefer a config with the requested channel count at the default rate, else
/// fall back to the device default.
fn preferred_config(
    device: &cpal::Device,
    channels: u16,
) -> Result<SupportedStreamConfig, GateError> {
    let default = device
        .default_input_config()
        .map_err(|err| GateError::DeviceUnavailable {
            reason: format!("no usable input configuration: {err}"),
        })?;
    if default.channels() == channels && is_convertible(default.sample_format()) {
        return Ok(default);
    }
    let rate = default.sample_rate();
    let Ok(ranges) = device.supported_input_configs() else {
        return Ok(default);
    };
    let matching = ranges
        .filter(|range| range.channels() == channels && is_convertible(range.sample_format()))
        .find(|range| range.min_sample_rate() <= rate && range.max_sample_rate() >= rate);
    Ok(matching
        .map(|range| range.with_sample_rate(rate))
        .unwrap_or(default))
}

struct CpalCapture {
    device: cpal::Device,
    supported: SupportedStreamConfig,
    label: String,
    stream: Option<cpal::Stream>,
}

impl CaptureDevice for CpalCapture {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn format(&self) -> StreamFormat {
        StreamFormat {
            sample_rate: self.supported.sample_rate().0,
            channels: self.supported.channels(),
        }
    }

    fn start(&mut self, mut callback: InputCallback) -> Result<(), GateError> {
        if self.stream.is_some() {
            return Err(GateError::InvalidState {
                operation: "start capture",
                state: "already capturing",
            });
        }
        let config: StreamConfig = self.supported.config();
        let err_fn = |err| log_debug(&format!("audio_stream_error: {err}"));

        let built = match self.supported.sample_format() {
            SampleFormat::F32 => self.device.build_input_stream(
                &config,
                move |data: &[f32], _| callback(data),
                err_fn,
                None,
            ),
            SampleFormat::I16 => {
                let mut scratch = Vec::with_capacity(CONVERT_SCRATCH_SAMPLES);
                self.device.build_input_stream(
                    &config,
                    move |data: &[i16], _| {
                        convert_into(&mut scratch, data, |sample| sample as f32 / 32_768.0);
                        callback(&scratch);
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::U16 => {
                let mut scratch = Vec::with_capacity(CONVERT_SCRATCH_SAMPLES);
                self.device.build_input_stream(
                    &config,
                    move |data: &[u16], _| {
                        convert_into(&mut scratch, data, |sample| {
                            (sample as f32 - 32_768.0) / 32_768.0
                        });
                        callback(&scratch);
                    },
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(GateError::DeviceUnavailable {
                    reason: format!("unsupported sample format: {other:?}"),
                })
            }
        };

        let stream = built.map_err(|err| GateError::DeviceUnavailable {
            reason: format!("could not open '{}': {err}", self.label),
        })?;
        stream
            .play()
            .map_err(|err| GateError::DeviceUnavailable {
                reason: format!("could not start '{}': {err}", self.label),
            })?;
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.pause() {
                log_debug(&format!("failed to pause audio stream: {err}"));
            }
            drop(stream);
            log_debug(&format!("capture '{}' stopped", self.label));
        }
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Convert one callback's worth of samples. The buffer only grows when the
/// backend hands over a block larger than anything seen before.
fn convert_into<T, F>(scratch: &mut Vec<f32>, data: &[T], convert: F)
where
    T: Copy,
    F: Fn(T) -> f32,
{
    scratch.clear();
    scratch.extend(data.iter().copied().map(convert));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_integer_samples_to_unit_range() {
        let mut scratch = Vec::new();
        convert_into(&mut scratch, &[i16::MIN, 0, 16_384], |s| s as f32 / 32_768.0);
        assert_eq!(scratch, vec![-1.0, 0.0, 0.5]);

        convert_into(&mut scratch, &[32_768u16, 0], |s| (s as f32 - 32_768.0) / 32_768.0);
        assert_eq!(scratch, vec![0.0, -1.0]);
    }

    #[test]
    fn only_linear_pcm_formats_are_convertible() {
        assert!(is_convertible(SampleFormat::F32));
        assert!(is_convertible(SampleFormat::I16));
        assert!(!is_convertible(SampleFormat::U8));
    }

    #[test]
    fn host_can_pin_a_device_name() {
        let host = CpalHost::new(Some("USB Mic"));
        assert_eq!(host.preferred_device.as_deref(), Some("USB Mic"));
        assert_eq!(host.name(), "cpal");
    }
}
