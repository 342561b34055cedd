//! Microphone capture and the processing graph around the noise gate.
//!
//! A host opens the microphone, the controller wires it through the gate (or
//! around it) into a lock-free output ring, and the meter and turn controller
//! observe the cleaned stream.

mod cpal_host;
mod graph;
mod host;
mod meter;
mod registry;
mod render;
mod turn;

pub use cpal_host::CpalHost;
pub use graph::{
    AudioGraphController, CancelHandle, GraphSettings, GraphState, DEFAULT_STREAM_CAPACITY_MS,
};
pub use host::{AudioHost, CaptureConstraints, CaptureDevice, InputCallback, StreamFormat};
pub use meter::{normalized_volume, LiveMeter, METER_FLOOR_DB};
pub use registry::{ProcessorContext, ProcessorFactory, ProcessorRegistry};
pub use render::{GraphStats, ProcessedStream};
pub use turn::{
    TurnConfig, TurnController, TurnEvent, DEFAULT_SMOOTHING_SAMPLES, DEFAULT_TURN_HANGOVER_MS,
    DEFAULT_TURN_THRESHOLD_DB,
};
