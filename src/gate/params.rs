//! Gate parameters and the swappable snapshot that carries them to the audio thread.

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

pub const THRESHOLD_RANGE_DB: RangeInclusive<f32> = -60.0..=0.0;
pub const ATTACK_RANGE_S: RangeInclusive<f32> = 0.001..=0.1;
pub const RELEASE_RANGE_S: RangeInclusive<f32> = 0.01..=1.0;

pub const DEFAULT_THRESHOLD_DB: f32 = -50.0;
pub const DEFAULT_ATTACK_S: f32 = 0.01;
pub const DEFAULT_RELEASE_S: f32 = 0.1;

/// One consistent set of gate parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSet {
    pub threshold_db: f32,
    pub attack_s: f32,
    pub release_s: f32,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            threshold_db: DEFAULT_THRESHOLD_DB,
            attack_s: DEFAULT_ATTACK_S,
            release_s: DEFAULT_RELEASE_S,
        }
    }
}

impl ParameterSet {
    /// Build a clamped set; non-finite inputs take the defaults.
    pub fn new(threshold_db: f32, attack_s: f32, release_s: f32) -> Self {
        Self {
            threshold_db,
            attack_s,
            release_s,
        }
        .sanitized_against(&Self::default())
    }

    /// Clamp every field into range, replacing non-finite values with `last_good`.
    pub fn sanitized_against(self, last_good: &ParameterSet) -> ParameterSet {
        ParameterSet {
            threshold_db: clamp_or(self.threshold_db, &THRESHOLD_RANGE_DB, last_good.threshold_db),
            attack_s: clamp_or(self.attack_s, &ATTACK_RANGE_S, last_good.attack_s),
            release_s: clamp_or(self.release_s, &RELEASE_RANGE_S, last_good.release_s),
        }
    }

    pub fn with_threshold_db(self, threshold_db: f32) -> Self {
        Self {
            threshold_db,
            ..self
        }
        .sanitized_against(&self)
    }

    pub fn with_attack_s(self, attack_s: f32) -> Self {
        Self { attack_s, ..self }.sanitized_against(&self)
    }

    pub fn with_release_s(self, release_s: f32) -> Self {
        Self { release_s, ..self }.sanitized_against(&self)
    }

    pub fn same_timing(&self, other: &ParameterSet) -> bool {
        self.attack_s == other.attack_s && self.release_s == other.release_s
    }
}

fn clamp_or(value: f32, range: &RangeInclusive<f32>, fallback: f32) -> f32 {
    let value = if value.is_finite() { value } else { fallback };
    value.clamp(*range.start(), *range.end())
}

/// A published parameter set tagged with its publish count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSnapshot {
    pub version: u64,
    pub params: ParameterSet,
}

/// Parameter mailbox between the control thread and the audio callback.
///
/// The audio thread does one wait-free `load()` per block. Publishers swap in a
/// whole new snapshot, so a read never sees a set that mixes two publishes.
#[derive(Debug)]
pub struct SharedParameters {
    current: ArcSwap<ParameterSnapshot>,
}

impl SharedParameters {
    pub fn new(initial: ParameterSet) -> Self {
        Self {
            current: ArcSwap::from_pointee(ParameterSnapshot {
                version: 0,
                params: initial.sanitized_against(&ParameterSet::default()),
            }),
        }
    }

    /// Publish a new set and return the sanitized values the audio thread will see.
    pub fn publish(&self, params: ParameterSet) -> ParameterSet {
        let mut applied = params;
        self.current.rcu(|current| {
            applied = params.sanitized_against(&current.params);
            ParameterSnapshot {
                version: current.version.wrapping_add(1),
                params: applied,
            }
        });
        applied
    }

    /// Last published set, for control-side readers.
    pub fn latest(&self) -> ParameterSet {
        self.current.load().params
    }

    /// Number of completed publishes.
    pub fn version(&self) -> u64 {
        self.current.load().version
    }

    /// Audio-thread read of the newest snapshot.
    pub fn read(&self) -> ParameterSnapshot {
        **self.current.load()
    }
}

impl Default for SharedParameters {
    fn default() -> Self {
        Self::new(ParameterSet::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn new_clamps_out_of_range_values() {
        let params = ParameterSet::new(-90.0, 5.0, 0.0);
        assert_eq!(params.threshold_db, -60.0);
        assert_eq!(params.attack_s, 0.1);
        assert_eq!(params.release_s, 0.01);
    }

    #[test]
    fn non_finite_values_fall_back_to_last_good() {
        let last_good = ParameterSet::new(-30.0, 0.02, 0.4);
        let next = ParameterSet {
            threshold_db: f32::NAN,
            attack_s: f32::INFINITY,
            release_s: 0.2,
        }
        .sanitized_against(&last_good);
        assert_eq!(next.threshold_db, -30.0);
        assert_eq!(next.attack_s, 0.02);
        assert_eq!(next.release_s, 0.2);
    }

    #[test]
    fn missing_json_fields_take_defaults() {
        let params: ParameterSet = serde_json::from_str(r#"{"threshold_db": -20.0}"#).unwrap();
        assert_eq!(params.threshold_db, -20.0);
        assert_eq!(params.attack_s, DEFAULT_ATTACK_S);
        assert_eq!(params.release_s, DEFAULT_RELEASE_S);
    }

    #[test]
    fn publish_bumps_version_and_is_readable() {
        let shared = SharedParameters::default();
        assert_eq!(shared.version(), 0);
        let applied = shared.publish(ParameterSet::new(-25.0, 0.005, 0.3));
        assert_eq!(shared.version(), 1);
        let snapshot = shared.read();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.params, applied);
        assert_eq!(shared.latest(), applied);
    }

    #[test]
    fn publish_replaces_nan_with_previous_publish() {
        let shared = SharedParameters::default();
        shared.publish(ParameterSet::new(-35.0, 0.01, 0.1));
        let applied = shared.publish(ParameterSet {
            threshold_db: f32::NAN,
            attack_s: 0.05,
            release_s: 0.5,
        });
        assert_eq!(applied.threshold_db, -35.0);
        assert_eq!(applied.attack_s, 0.05);
    }

    #[test]
    fn reads_during_publishing_are_always_consistent_and_fresh() {
        let shared = Arc::new(SharedParameters::default());
        let done = Arc::new(AtomicBool::new(false));
        let writer = {
            let shared = shared.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut i = 0u32;
                while !done.load(Ordering::Relaxed) {
                    let t = -60.0 + (i % 60) as f32;
                    // attack and release always move together so a mixed read is detectable
                    let step = (i % 10) as f32;
                    shared.publish(ParameterSet::new(t, 0.001 + step * 0.001, 0.01 + step * 0.01));
                    i = i.wrapping_add(1);
                }
            })
        };
        let mut last_version = 0;
        for _ in 0..50_000 {
            let snapshot = shared.read();
            let attack_step = ((snapshot.params.attack_s - 0.001) / 0.001).round();
            let release_step = ((snapshot.params.release_s - 0.01) / 0.01).round();
            assert_eq!(attack_step, release_step, "mixed read: {snapshot:?}");
            assert!(snapshot.version >= last_version);
            last_version = snapshot.version;
        }
        done.store(true, Ordering::Relaxed);
        writer.join().unwrap();

        let before = shared.version();
        let applied = shared.publish(ParameterSet::new(-7.0, 0.05, 0.5));
        let snapshot = shared.read();
        assert_eq!(snapshot.version, before + 1);
        assert_eq!(snapshot.params, applied);
    }

    #[test]
    fn concurrent_publishers_each_bump_the_version() {
        let shared = Arc::new(SharedParameters::default());
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for i in 0..500 {
                        let release = 0.1 + i as f32 * 0.001;
                        shared.publish(ParameterSet::new(-40.0 + w as f32, 0.01, release));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(shared.version(), 2_000);
    }
}
