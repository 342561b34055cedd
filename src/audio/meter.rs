//! Level meter shared between the audio thread and the UI.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Level shown when nothing is flowing, and the bottom of the volume scale.
pub const METER_FLOOR_DB: f32 = -60.0;

/// Cleaned-stream level written once per block by the audio thread and read at
/// UI refresh rate by visualizers and the turn controller.
#[derive(Clone, Debug)]
pub struct LiveMeter {
    level_bits: Arc<AtomicU32>,
}

impl LiveMeter {
    pub fn new() -> Self {
        Self {
            level_bits: Arc::new(AtomicU32::new(METER_FLOOR_DB.to_bits())),
        }
    }

    pub fn set_db(&self, db: f32) {
        self.level_bits.store(db.to_bits(), Ordering::Relaxed);
    }

    pub fn level_db(&self) -> f32 {
        f32::from_bits(self.level_bits.load(Ordering::Relaxed))
    }

    /// Level mapped onto 0.0..=1.0 across the meter range.
    pub fn volume(&self) -> f32 {
        normalized_volume(self.level_db())
    }

    pub fn reset(&self) {
        self.set_db(METER_FLOOR_DB);
    }
}

impl Default for LiveMeter {
    fn default() -> Self {
        Self::new()
    }
}

pub fn normalized_volume(db: f32) -> f32 {
    if !db.is_finite() {
        return 0.0;
    }
    ((db - METER_FLOOR_DB) / -METER_FLOOR_DB).clamp(0.0, 1.0)
}

/// RMS level in dBFS from a running sum of squares.
#[inline]
pub(crate) fn energy_db(sum_squares: f32, samples: usize) -> f32 {
    if samples == 0 {
        return METER_FLOOR_DB;
    }
    let rms = (sum_squares / samples as f32).sqrt().max(1e-6);
    (20.0 * rms.log10()).max(METER_FLOOR_DB)
}
