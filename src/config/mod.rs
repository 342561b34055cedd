//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use crate::audio::{CaptureConstraints, GraphSettings, TurnConfig, DEFAULT_SMOOTHING_SAMPLES};
use crate::gate::{
    ParameterSet, DEFAULT_ATTACK_S, DEFAULT_RELEASE_S, DEFAULT_THRESHOLD_DB, NOISE_GATE_PROCESSOR,
};
use crate::settings::GateSettingsPanel;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

pub use defaults::{
    DEFAULT_METER_INTERVAL_MS, DEFAULT_STREAM_CAPACITY_MS, DEFAULT_TURN_HANGOVER_MS,
    DEFAULT_TURN_THRESHOLD_DB, MAX_METER_INTERVAL_MS, MAX_STREAM_CAPACITY_MS,
    MAX_TURN_HANGOVER_MS, MIN_METER_INTERVAL_MS, MIN_STREAM_CAPACITY_MS, MIN_TURN_HANGOVER_MS,
};

/// CLI options for the VoiceGate microphone monitor.
#[derive(Debug, Parser, Clone)]
#[command(about = "VoiceGate adaptive noise-gated microphone", author, version)]
pub struct AppConfig {
    /// Preferred audio input device name
    #[arg(long, env = "VOICEGATE_INPUT_DEVICE")]
    pub input_device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Gate threshold (dBFS); quieter audio is attenuated
    #[arg(
        long = "threshold-db",
        default_value_t = DEFAULT_THRESHOLD_DB,
        allow_negative_numbers = true
    )]
    pub threshold_db: f32,

    /// Envelope attack time (seconds)
    #[arg(long = "attack-s", default_value_t = DEFAULT_ATTACK_S)]
    pub attack_s: f32,

    /// Envelope release time (seconds)
    #[arg(long = "release-s", default_value_t = DEFAULT_RELEASE_S)]
    pub release_s: f32,

    /// Registered processor to load into the graph
    #[arg(long, default_value = NOISE_GATE_PROCESSOR)]
    pub processor: String,

    /// Start with the gate bypassed
    #[arg(long, default_value_t = false)]
    pub bypass: bool,

    /// Cleaned-stream buffer between the audio thread and readers (milliseconds)
    #[arg(long = "stream-capacity-ms", default_value_t = DEFAULT_STREAM_CAPACITY_MS)]
    pub stream_capacity_ms: u64,

    /// JSON file with saved gate settings; loaded at start, written on save
    #[arg(long = "settings-file", env = "VOICEGATE_SETTINGS_FILE")]
    pub settings_file: Option<PathBuf>,

    /// Record the cleaned stream to a WAV file
    #[arg(long = "record-wav")]
    pub record_wav: Option<PathBuf>,

    /// Meter refresh interval (milliseconds)
    #[arg(long = "meter-interval-ms", default_value_t = DEFAULT_METER_INTERVAL_MS)]
    pub meter_interval_ms: u64,

    /// Level that counts as speech for turn detection (dBFS)
    #[arg(
        long = "turn-threshold-db",
        default_value_t = DEFAULT_TURN_THRESHOLD_DB,
        allow_negative_numbers = true
    )]
    pub turn_threshold_db: f32,

    /// Silence required before a speech turn ends (milliseconds)
    #[arg(long = "turn-hangover-ms", default_value_t = DEFAULT_TURN_HANGOVER_MS)]
    pub turn_hangover_ms: u64,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "VOICEGATE_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "VOICEGATE_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Enable structured timing logs
    #[arg(long)]
    pub log_timings: bool,
}

impl AppConfig {
    /// Starting gate parameters: the settings file when it exists, else the CLI values.
    pub fn initial_parameters(&self) -> Result<ParameterSet> {
        match self.settings_file.as_deref() {
            Some(path) if path.exists() => GateSettingsPanel::load(path),
            _ => Ok(ParameterSet::from(self)),
        }
    }
}

impl From<&AppConfig> for ParameterSet {
    fn from(config: &AppConfig) -> Self {
        ParameterSet::new(config.threshold_db, config.attack_s, config.release_s)
    }
}

impl From<&AppConfig> for GraphSettings {
    fn from(config: &AppConfig) -> Self {
        GraphSettings {
            constraints: CaptureConstraints::default(),
            processor_name: config.processor.clone(),
            stream_capacity_ms: config.stream_capacity_ms,
        }
    }
}

impl From<&AppConfig> for TurnConfig {
    fn from(config: &AppConfig) -> Self {
        TurnConfig {
            threshold_db: config.turn_threshold_db,
            hangover_ms: config.turn_hangover_ms,
            smoothing_samples: DEFAULT_SMOOTHING_SAMPLES,
        }
    }
}
