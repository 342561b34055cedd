//! Device-layer seam between the graph controller and a concrete audio backend.

use crate::error::GateError;

/// Capture hints passed to the device layer before the gate runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub auto_gain_control: bool,
    pub noise_suppression: bool,
    pub channel_count: u16,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            auto_gain_control: true,
            noise_suppression: true,
            channel_count: 1,
        }
    }
}

/// Negotiated stream layout. Samples are always interleaved f32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl StreamFormat {
    pub fn channel_count(&self) -> usize {
        usize::from(self.channels.max(1))
    }

    /// Interleaved samples per `ms` milliseconds of audio.
    pub fn samples_for_ms(&self, ms: u64) -> usize {
        ((u64::from(self.sample_rate) * ms) / 1000) as usize * self.channel_count()
    }
}

/// Callback the device invokes on its real-time thread with each captured block.
pub type InputCallback = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// Something that can hand out microphone captures.
pub trait AudioHost {
    fn name(&self) -> &str;

    /// Whether blocks can be run through a processor on the callback thread.
    fn supports_realtime_processing(&self) -> bool {
        true
    }

    fn open_capture(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureDevice>, GateError>;
}

/// An acquired microphone. Dropping it or calling `stop` releases the device.
pub trait CaptureDevice {
    fn label(&self) -> String;

    fn format(&self) -> StreamFormat;

    /// Start delivering blocks to `callback`. Called at most once per device.
    fn start(&mut self, callback: InputCallback) -> Result<(), GateError>;

    /// Stop all tracks. Must be idempotent.
    fn stop(&mut self);
}
