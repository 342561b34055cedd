//! VoiceGate: an adaptive noise gate between the microphone and the rest of the
//! session.
//!
//! [`audio::AudioGraphController`] owns the device and the processing graph,
//! [`gate`] holds the real-time DSP, and [`settings::GateSettingsPanel`] turns
//! user edits into lock-free parameter updates.

mod app;
pub mod audio;
pub mod config;
pub mod error;
pub mod gate;
pub mod settings;
pub mod telemetry;
pub mod terminal_restore;

pub use app::{crash_log_path, init_logging, log_debug, log_file_path, log_panic};
pub use error::{GateError, Severity};
