//! Turn-taking on top of the cleaned-stream meter.
//!
//! The meter is sampled at UI rate, each sample is labelled by level, the
//! labels are majority-voted over a short window, and a speech turn only ends
//! once smoothed silence has lasted the hangover.

use super::meter::LiveMeter;
use std::cmp::Ordering as CmpOrdering;
use std::collections::VecDeque;

pub const DEFAULT_TURN_THRESHOLD_DB: f32 = -40.0;
pub const DEFAULT_TURN_HANGOVER_MS: u64 = 700;
pub const DEFAULT_SMOOTHING_SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    SpeechStarted,
    /// `speech_ms` is the time spent above threshold during the turn.
    SpeechEnded { speech_ms: u64 },
}

#[derive(Debug, Clone)]
pub struct TurnConfig {
    pub threshold_db: f32,
    pub hangover_ms: u64,
    pub smoothing_samples: usize,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            threshold_db: DEFAULT_TURN_THRESHOLD_DB,
            hangover_ms: DEFAULT_TURN_HANGOVER_MS,
            smoothing_samples: DEFAULT_SMOOTHING_SAMPLES,
        }
    }
}

pub struct TurnController {
    cfg: TurnConfig,
    window: VecDeque<bool>,
    speaking: bool,
    speech_ms: u64,
    silence_streak_ms: u64,
}

impl TurnController {
    pub fn new(cfg: TurnConfig) -> Self {
        Self {
            window: VecDeque::with_capacity(cfg.smoothing_samples.max(1)),
            cfg,
            speaking: false,
            speech_ms: 0,
            silence_streak_ms: 0,
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Read the meter and advance by `elapsed_ms` since the previous sample.
    pub fn sample(&mut self, meter: &LiveMeter, elapsed_ms: u64) -> Option<TurnEvent> {
        self.on_level(meter.level_db(), elapsed_ms)
    }

    pub fn on_level(&mut self, level_db: f32, elapsed_ms: u64) -> Option<TurnEvent> {
        let loud = self.smooth(level_db >= self.cfg.threshold_db);
        if loud {
            self.silence_streak_ms = 0;
            if self.speaking {
                self.speech_ms = self.speech_ms.saturating_add(elapsed_ms);
                return None;
            }
            self.speaking = true;
            self.speech_ms = 0;
            return Some(TurnEvent::SpeechStarted);
        }

        if !self.speaking {
            return None;
        }
        self.silence_streak_ms = self.silence_streak_ms.saturating_add(elapsed_ms);
        if self.silence_streak_ms < self.cfg.hangover_ms {
            return None;
        }
        self.speaking = false;
        self.silence_streak_ms = 0;
        Some(TurnEvent::SpeechEnded {
            speech_ms: self.speech_ms,
        })
    }

    /// Forget the window and any turn in progress, e.g. after the graph restarts.
    pub fn reset(&mut self) {
        self.window.clear();
        self.speaking = false;
        self.speech_ms = 0;
        self.silence_streak_ms = 0;
    }

    /// Majority of the last `smoothing_samples` labels; ties keep the newest.
    fn smooth(&mut self, loud: bool) -> bool {
        let size = self.cfg.smoothing_samples.max(1);
        if size == 1 {
            return loud;
        }
        self.window.push_back(loud);
        if self.window.len() > size {
            self.window.pop_front();
        }
        let speech = self.window.iter().filter(|&&item| item).count();
        let silence = self.window.len() - speech;
        match speech.cmp(&silence) {
            CmpOrdering::Greater => true,
            CmpOrdering::Less => false,
            CmpOrdering::Equal => loud,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(hangover_ms: u64, smoothing_samples: usize) -> TurnController {
        TurnController::new(TurnConfig {
            threshold_db: -40.0,
            hangover_ms,
            smoothing_samples,
        })
    }

    #[test]
    fn quiet_room_never_starts_a_turn() {
        let mut turns = controller(200, 3);
        for _ in 0..20 {
            assert_eq!(turns.on_level(-70.0, 50), None);
        }
        assert!(!turns.is_speaking());
    }

    #[test]
    fn single_spike_is_smoothed_away() {
        let mut turns = controller(200, 3);
        assert_eq!(turns.on_level(-70.0, 50), None);
        assert_eq!(turns.on_level(-70.0, 50), None);
        assert_eq!(turns.on_level(-10.0, 50), None);
        assert_eq!(turns.on_level(-70.0, 50), None);
        assert!(!turns.is_speaking());
    }

    #[test]
    fn turn_ends_only_after_hangover() {
        let mut turns = controller(200, 1);
        assert_eq!(turns.on_level(-20.0, 50), Some(TurnEvent::SpeechStarted));
        assert_eq!(turns.on_level(-20.0, 50), None);
        assert_eq!(turns.on_level(-20.0, 50), None);

        assert_eq!(turns.on_level(-70.0, 100), None);
        // Brief dip resets the silence streak.
        assert_eq!(turns.on_level(-20.0, 50), None);
        assert_eq!(turns.on_level(-70.0, 100), None);
        assert_eq!(
            turns.on_level(-70.0, 100),
            Some(TurnEvent::SpeechEnded { speech_ms: 150 })
        );
        assert!(!turns.is_speaking());
    }

    #[test]
    fn samples_the_live_meter() {
        let meter = LiveMeter::new();
        let mut turns = controller(100, 1);
        assert_eq!(turns.sample(&meter, 80), None);
        meter.set_db(-12.0);
        assert_eq!(turns.sample(&meter, 80), Some(TurnEvent::SpeechStarted));
        meter.reset();
        assert_eq!(
            turns.sample(&meter, 120),
            Some(TurnEvent::SpeechEnded { speech_ms: 0 })
        );

        meter.set_db(-12.0);
        turns.sample(&meter, 80);
        turns.reset();
        assert!(!turns.is_speaking());
    }
}
