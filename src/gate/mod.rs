//! The noise gate itself: parameters, envelope follower, gain curve, and the
//! block processor the audio callback drives.
//!
//! Nothing in this module owns a device or a thread. It operates purely on the
//! buffers it is handed.

mod curve;
mod envelope;
mod params;
mod processor;

pub use curve::{GateCurve, FLOOR_GAIN, TRANSITION_WIDTH_DB};
pub use envelope::{
    level_db, EnvelopeFollower, SmoothingCoefficients, ENVELOPE_START_DB, LEVEL_FLOOR_DB,
};
pub use params::{
    ParameterSet, ParameterSnapshot, SharedParameters, ATTACK_RANGE_S, DEFAULT_ATTACK_S,
    DEFAULT_RELEASE_S, DEFAULT_THRESHOLD_DB, RELEASE_RANGE_S, THRESHOLD_RANGE_DB,
};
pub use processor::{
    AudioTransform, BlockFault, NoiseGateProcessor, Passthrough, ProcessorOptions, MAX_CHANNELS,
    NOISE_GATE_PROCESSOR,
};
