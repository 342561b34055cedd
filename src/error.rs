//! Error taxonomy for the gate pipeline.
//!
//! Every variant answers one question for the user: do they have audio at all,
//! and if so, is it being cleaned?

use thiserror::Error;

/// How an error affects the running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// No audio reaches the session.
    Fatal,
    /// Audio flows but the gate is out of the path.
    Degraded,
    /// Audio flows through the gate; some blocks were passed through untouched.
    Warning,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GateError {
    #[error("microphone unavailable: {reason}")]
    DeviceUnavailable { reason: String },

    #[error("{host} cannot run a real-time processor: {reason}")]
    RuntimeUnsupported { host: String, reason: String },

    #[error("processor '{name}' failed to load: {reason}")]
    ProcessorLoadFailure { name: String, reason: String },

    #[error("processor faulted on {faulted_blocks} block(s); those blocks passed through unprocessed")]
    ProcessorRuntimeError { faulted_blocks: u64 },

    #[error("audio graph setup cancelled")]
    Cancelled,

    #[error("cannot {operation} while the audio graph is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
}

impl GateError {
    pub fn severity(&self) -> Severity {
        match self {
            GateError::DeviceUnavailable { .. }
            | GateError::Cancelled
            | GateError::InvalidState { .. } => Severity::Fatal,
            GateError::RuntimeUnsupported { .. } | GateError::ProcessorLoadFailure { .. } => {
                Severity::Degraded
            }
            GateError::ProcessorRuntimeError { .. } => Severity::Warning,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Short label for logs and JSON telemetry.
    pub fn label(&self) -> &'static str {
        match self {
            GateError::DeviceUnavailable { .. } => "device_unavailable",
            GateError::RuntimeUnsupported { .. } => "runtime_unsupported",
            GateError::ProcessorLoadFailure { .. } => "processor_load_failure",
            GateError::ProcessorRuntimeError { .. } => "processor_runtime_error",
            GateError::Cancelled => "cancelled",
            GateError::InvalidState { .. } => "invalid_state",
        }
    }

    /// Human-readable message that tells the user whether they still have audio.
    pub fn user_message(&self) -> String {
        match self {
            GateError::DeviceUnavailable { .. } => {
                format!("No microphone audio: {self}. {}", mic_permission_hint())
            }
            GateError::RuntimeUnsupported { .. } => format!(
                "Your audio is working but unprocessed for this session: {self}."
            ),
            GateError::ProcessorLoadFailure { .. } => format!(
                "Your audio is working but unprocessed (noise gate bypassed): {self}."
            ),
            GateError::ProcessorRuntimeError { .. } => {
                format!("Your audio is working; the noise gate skipped some audio: {self}.")
            }
            GateError::Cancelled => "Microphone setup was cancelled; no audio is flowing.".into(),
            GateError::InvalidState { .. } => format!("{self}."),
        }
    }
}

pub(crate) fn mic_permission_hint() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "macOS: System Settings > Privacy & Security > Microphone (enable your terminal)."
    }
    #[cfg(target_os = "linux")]
    {
        "Linux: check PipeWire/PulseAudio permissions and ensure the device is not muted."
    }
    #[cfg(target_os = "windows")]
    {
        "Windows: Settings > Privacy & Security > Microphone (allow access for your terminal)."
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        "Check OS microphone permissions."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_loss_is_the_only_fatal_pipeline_error() {
        let device = GateError::DeviceUnavailable {
            reason: "permission denied".into(),
        };
        let load = GateError::ProcessorLoadFailure {
            name: "noise-gate-processor".into(),
            reason: "not registered".into(),
        };
        let runtime = GateError::RuntimeUnsupported {
            host: "test".into(),
            reason: "no callback".into(),
        };
        assert!(device.is_fatal());
        assert_eq!(load.severity(), Severity::Degraded);
        assert_eq!(runtime.severity(), Severity::Degraded);
        assert_eq!(
            GateError::ProcessorRuntimeError { faulted_blocks: 2 }.severity(),
            Severity::Warning
        );
    }

    #[test]
    fn user_messages_distinguish_no_audio_from_unprocessed_audio() {
        let device = GateError::DeviceUnavailable {
            reason: "no default input device".into(),
        };
        assert!(device.user_message().starts_with("No microphone audio"));

        let load = GateError::ProcessorLoadFailure {
            name: "noise-gate-processor".into(),
            reason: "not registered".into(),
        };
        assert!(load.user_message().contains("working but unprocessed"));
        assert!(load.user_message().contains("noise-gate-processor"));
    }
}
