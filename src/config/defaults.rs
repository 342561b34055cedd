pub const DEFAULT_STREAM_CAPACITY_MS: u64 = crate::audio::DEFAULT_STREAM_CAPACITY_MS;
pub const MIN_STREAM_CAPACITY_MS: u64 = 100;
pub const MAX_STREAM_CAPACITY_MS: u64 = 10_000;

/// UI refresh for the meter; the turn controller samples at the same rate.
pub const DEFAULT_METER_INTERVAL_MS: u64 = 80;
pub const MIN_METER_INTERVAL_MS: u64 = 16;
pub const MAX_METER_INTERVAL_MS: u64 = 1_000;

pub const DEFAULT_TURN_THRESHOLD_DB: f32 = crate::audio::DEFAULT_TURN_THRESHOLD_DB;
pub const DEFAULT_TURN_HANGOVER_MS: u64 = crate::audio::DEFAULT_TURN_HANGOVER_MS;
pub const MIN_TURN_HANGOVER_MS: u64 = 50;
pub const MAX_TURN_HANGOVER_MS: u64 = 5_000;

pub(super) const MAX_DEVICE_NAME_BYTES: usize = 256;
pub(super) const MAX_PROCESSOR_NAME_BYTES: usize = 64;
