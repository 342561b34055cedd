//! Asymmetric one-pole envelope follower in the dB domain.

/// Level reported for samples too small to take a logarithm of.
pub const LEVEL_FLOOR_DB: f32 = -100.0;

/// Envelope value a freshly constructed follower starts from.
pub const ENVELOPE_START_DB: f32 = -60.0;

const SILENCE_EPSILON: f32 = 1e-10;

/// Instantaneous sample level in dBFS.
#[inline]
pub fn level_db(sample: f32) -> f32 {
    let magnitude = sample.abs();
    if magnitude < SILENCE_EPSILON {
        LEVEL_FLOOR_DB
    } else {
        20.0 * magnitude.log10()
    }
}

/// Per-sample smoothing factors derived from attack/release times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingCoefficients {
    pub attack: f32,
    pub release: f32,
}

impl SmoothingCoefficients {
    pub fn derive(attack_s: f32, release_s: f32, sample_rate: f32) -> Self {
        Self {
            attack: time_coefficient(attack_s, sample_rate),
            release: time_coefficient(release_s, sample_rate),
        }
    }
}

// exp(-1 / (sample_rate * time)); computed in f64 since long release times sit
// very close to 1.0.
fn time_coefficient(time_s: f32, sample_rate: f32) -> f32 {
    let samples = f64::from(sample_rate) * f64::from(time_s);
    if samples.is_nan() || samples <= 0.0 {
        return 0.0;
    }
    (-1.0 / samples).exp() as f32
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeFollower {
    envelope_db: f32,
}

impl EnvelopeFollower {
    pub fn new() -> Self {
        Self {
            envelope_db: ENVELOPE_START_DB,
        }
    }

    pub fn envelope_db(&self) -> f32 {
        self.envelope_db
    }

    /// Feed one level reading. Rising input uses the attack factor, falling the release.
    #[inline]
    pub fn next(&mut self, level_db: f32, coefficients: &SmoothingCoefficients) -> f32 {
        let coeff = if level_db > self.envelope_db {
            coefficients.attack
        } else {
            coefficients.release
        };
        self.envelope_db = coeff * self.envelope_db + (1.0 - coeff) * level_db;
        self.envelope_db
    }

    pub fn reset(&mut self) {
        self.envelope_db = ENVELOPE_START_DB;
    }
}

impl Default for EnvelopeFollower {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f32 = 48_000.0;

    #[test]
    fn level_of_silence_is_floored() {
        assert_eq!(level_db(0.0), LEVEL_FLOOR_DB);
        assert_eq!(level_db(1e-12), LEVEL_FLOOR_DB);
        assert!((level_db(1.0) - 0.0).abs() < 1e-6);
        assert!((level_db(-0.1) + 20.0).abs() < 1e-4);
    }

    #[test]
    fn coefficients_follow_time_constants() {
        let coeffs = SmoothingCoefficients::derive(0.01, 0.1, RATE);
        let expected_attack = (-1.0f64 / (48_000.0 * 0.01)).exp() as f32;
        assert!((coeffs.attack - expected_attack).abs() < 1e-7);
        assert!(coeffs.attack > 0.0 && coeffs.attack < 1.0);
        assert!(coeffs.release > coeffs.attack);
        assert!(coeffs.release < 1.0);
    }

    #[test]
    fn degenerate_time_means_no_smoothing() {
        let coeffs = SmoothingCoefficients::derive(0.0, 0.1, RATE);
        assert_eq!(coeffs.attack, 0.0);
    }

    #[test]
    fn envelope_converges_without_jumping() {
        let coeffs = SmoothingCoefficients::derive(0.01, 0.1, RATE);
        let mut follower = EnvelopeFollower::new();
        let target = -6.0;
        let mut previous = follower.envelope_db();
        let first = follower.next(target, &coeffs);
        assert!(first < target, "envelope jumped to input in one sample");
        assert!(first > previous);
        previous = first;
        for _ in 0..4_800 {
            let value = follower.next(target, &coeffs);
            assert!(value >= previous - 1e-5 && value <= target + 1e-5);
            previous = value;
        }
        assert!((follower.envelope_db() - target).abs() < 0.01);
    }

    #[test]
    fn release_is_slower_than_attack() {
        let coeffs = SmoothingCoefficients::derive(0.005, 0.2, RATE);
        let mut rising = EnvelopeFollower::new();
        let mut falling = EnvelopeFollower {
            envelope_db: -10.0,
        };
        for _ in 0..240 {
            rising.next(-10.0, &coeffs);
            falling.next(-60.0, &coeffs);
        }
        let rise = rising.envelope_db() - ENVELOPE_START_DB;
        let fall = -10.0 - falling.envelope_db();
        assert!(rise > fall * 5.0, "rise {rise} fall {fall}");
    }

    #[test]
    fn reset_restores_start_level() {
        let coeffs = SmoothingCoefficients::derive(0.001, 0.01, RATE);
        let mut follower = EnvelopeFollower::new();
        follower.next(0.0, &coeffs);
        follower.reset();
        assert_eq!(follower.envelope_db(), ENVELOPE_START_DB);
    }
}
