//! Soft-knee gain curve.
//!
//! Below the threshold the gain falls linearly across a transition band down to
//! a non-zero floor, so signals hovering around the threshold never flip between
//! full level and silence from one sample to the next.

/// Residual gain once the envelope is a full band below threshold (-40 dB).
pub const FLOOR_GAIN: f32 = 0.01;

/// Width of the band between full gain and the floor.
pub const TRANSITION_WIDTH_DB: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateCurve {
    floor_gain: f32,
    transition_width_db: f32,
}

impl Default for GateCurve {
    fn default() -> Self {
        Self {
            floor_gain: FLOOR_GAIN,
            transition_width_db: TRANSITION_WIDTH_DB,
        }
    }
}

impl GateCurve {
    pub fn floor_gain(&self) -> f32 {
        self.floor_gain
    }

    pub fn transition_width_db(&self) -> f32 {
        self.transition_width_db
    }

    #[inline]
    pub fn gain(&self, envelope_db: f32, threshold_db: f32) -> f32 {
        let distance_below = threshold_db - envelope_db;
        if distance_below <= 0.0 {
            1.0
        } else if distance_below >= self.transition_width_db {
            self.floor_gain
        } else {
            let ratio = distance_below / self.transition_width_db;
            1.0 - (1.0 - self.floor_gain) * ratio
        }
    }
}
