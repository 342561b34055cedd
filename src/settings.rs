//! Gate settings panel: the only place user edits become parameter updates.
//!
//! The panel clamps every edit, publishes the result, and remembers what was
//! actually applied. It never sees audio buffers and never rebuilds the graph.

use crate::audio::AudioGraphController;
use crate::gate::{ParameterSet, SharedParameters};
use crate::log_debug;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub const THRESHOLD_STEP_DB: f32 = 1.0;
pub const ATTACK_STEP_S: f32 = 0.005;
pub const RELEASE_STEP_S: f32 = 0.05;

/// Anything that accepts a parameter set and reports the clamped set it applied.
pub trait ParameterTarget {
    fn update_parameters(&mut self, params: ParameterSet) -> ParameterSet;
}

impl ParameterTarget for AudioGraphController {
    fn update_parameters(&mut self, params: ParameterSet) -> ParameterSet {
        AudioGraphController::update_parameters(self, params)
    }
}

impl ParameterTarget for Arc<SharedParameters> {
    fn update_parameters(&mut self, params: ParameterSet) -> ParameterSet {
        self.publish(params)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsItem {
    Threshold,
    Attack,
    Release,
}

pub const SETTINGS_ITEMS: &[SettingsItem] = &[
    SettingsItem::Threshold,
    SettingsItem::Attack,
    SettingsItem::Release,
];

impl SettingsItem {
    pub fn label(self) -> &'static str {
        match self {
            SettingsItem::Threshold => "Threshold",
            SettingsItem::Attack => "Attack",
            SettingsItem::Release => "Release",
        }
    }

    /// Current value of this item, formatted with its unit.
    pub fn format_value(self, params: &ParameterSet) -> String {
        match self {
            SettingsItem::Threshold => format!("{:.0} dB", params.threshold_db),
            SettingsItem::Attack => format!("{:.0} ms", params.attack_s * 1000.0),
            SettingsItem::Release => format!("{:.0} ms", params.release_s * 1000.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GateSettingsPanel {
    params: ParameterSet,
    selected: usize,
}

impl GateSettingsPanel {
    pub fn new(initial: ParameterSet) -> Self {
        Self {
            params: initial.sanitized_against(&ParameterSet::default()),
            selected: 0,
        }
    }

    pub fn params(&self) -> ParameterSet {
        self.params
    }

    pub fn selected_item(&self) -> SettingsItem {
        SETTINGS_ITEMS
            .get(self.selected)
            .copied()
            .unwrap_or(SettingsItem::Threshold)
    }

    pub fn move_up(&mut self) {
        if self.selected == 0 {
            self.selected = SETTINGS_ITEMS.len().saturating_sub(1);
        } else {
            self.selected -= 1;
        }
    }

    pub fn move_down(&mut self) {
        self.selected = (self.selected + 1) % SETTINGS_ITEMS.len();
    }

    pub fn on_threshold_change(
        &mut self,
        target: &mut impl ParameterTarget,
        threshold_db: f32,
    ) -> ParameterSet {
        self.apply(target, self.params.with_threshold_db(threshold_db))
    }

    pub fn on_attack_change(
        &mut self,
        target: &mut impl ParameterTarget,
        attack_s: f32,
    ) -> ParameterSet {
        self.apply(target, self.params.with_attack_s(attack_s))
    }

    pub fn on_release_change(
        &mut self,
        target: &mut impl ParameterTarget,
        release_s: f32,
    ) -> ParameterSet {
        self.apply(target, self.params.with_release_s(release_s))
    }

    /// Step the selected item by `steps` increments (negative steps go down).
    pub fn adjust_selected(&mut self, target: &mut impl ParameterTarget, steps: i32) -> ParameterSet {
        let steps = steps as f32;
        match self.selected_item() {
            SettingsItem::Threshold => {
                let next = self.params.threshold_db + steps * THRESHOLD_STEP_DB;
                self.on_threshold_change(target, next)
            }
            SettingsItem::Attack => {
                let next = self.params.attack_s + steps * ATTACK_STEP_S;
                self.on_attack_change(target, next)
            }
            SettingsItem::Release => {
                let next = self.params.release_s + steps * RELEASE_STEP_S;
                self.on_release_change(target, next)
            }
        }
    }

    pub fn reset_to_defaults(&mut self, target: &mut impl ParameterTarget) -> ParameterSet {
        self.apply(target, ParameterSet::default())
    }

    fn apply(&mut self, target: &mut impl ParameterTarget, params: ParameterSet) -> ParameterSet {
        self.params = target.update_parameters(params);
        self.params
    }

    /// Read a saved set; missing fields take defaults, out-of-range values are clamped.
    pub fn load(path: &Path) -> Result<ParameterSet> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let params: ParameterSet = serde_json::from_str(&text)
            .with_context(|| format!("invalid settings file {}", path.display()))?;
        log_debug(&format!("loaded gate settings from {}", path.display()));
        Ok(params.sanitized_against(&ParameterSet::default()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.params)?;
        fs::write(path, text)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        log_debug(&format!("saved gate settings to {}", path.display()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::process;

    #[derive(Default)]
    struct Recording {
        published: Vec<ParameterSet>,
    }

    impl ParameterTarget for Recording {
        fn update_parameters(&mut self, params: ParameterSet) -> ParameterSet {
            self.published.push(params);
            params
        }
    }

    #[test]
    fn selection_wraps_both_ways() {
        let mut panel = GateSettingsPanel::new(ParameterSet::default());
        assert_eq!(panel.selected_item(), SettingsItem::Threshold);
        panel.move_up();
        assert_eq!(panel.selected_item(), SettingsItem::Release);
        panel.move_down();
        panel.move_down();
        assert_eq!(panel.selected_item(), SettingsItem::Attack);
    }

    #[test]
    fn edits_are_clamped_before_publishing() {
        let mut panel = GateSettingsPanel::new(ParameterSet::default());
        let mut target = Recording::default();

        let applied = panel.on_threshold_change(&mut target, 12.0);
        assert_eq!(applied.threshold_db, 0.0);
        let applied = panel.on_attack_change(&mut target, f32::NAN);
        assert_eq!(applied.attack_s, ParameterSet::default().attack_s);
        let applied = panel.on_release_change(&mut target, 5.0);
        assert_eq!(applied.release_s, 1.0);

        assert_eq!(target.published.len(), 3);
        assert_eq!(panel.params(), *target.published.last().unwrap());
    }

    #[test]
    fn stepping_moves_the_selected_item_only() {
        let mut panel = GateSettingsPanel::new(ParameterSet::default());
        let mut target = Recording::default();

        let applied = panel.adjust_selected(&mut target, -3);
        assert_eq!(applied.threshold_db, -53.0);
        panel.move_down();
        let applied = panel.adjust_selected(&mut target, 2);
        assert!((applied.attack_s - 0.02).abs() < 1e-6);
        assert_eq!(applied.threshold_db, -53.0);
        assert_eq!(applied.release_s, ParameterSet::default().release_s);

        assert_eq!(panel.reset_to_defaults(&mut target), ParameterSet::default());
    }

    #[test]
    fn shared_parameters_are_a_target() {
        let mut shared = Arc::new(SharedParameters::default());
        let mut panel = GateSettingsPanel::new(ParameterSet::default());
        panel.on_threshold_change(&mut shared, -30.0);
        assert_eq!(shared.latest().threshold_db, -30.0);
    }

    #[test]
    fn settings_round_trip_through_json() {
        let path = env::temp_dir().join(format!("voicegate_settings_{}.json", process::id()));
        let mut panel = GateSettingsPanel::new(ParameterSet::default());
        panel.on_threshold_change(&mut Recording::default(), -42.0);
        panel.save(&path).unwrap();

        let loaded = GateSettingsPanel::load(&path).unwrap();
        assert_eq!(loaded, panel.params());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn partial_or_out_of_range_files_are_repaired() {
        let path = env::temp_dir().join(format!("voicegate_partial_{}.json", process::id()));
        fs::write(&path, r#"{"threshold_db": -90.0}"#).unwrap();
        let loaded = GateSettingsPanel::load(&path).unwrap();
        assert_eq!(loaded.threshold_db, -60.0);
        assert_eq!(loaded.attack_s, ParameterSet::default().attack_s);
        let _ = fs::remove_file(&path);

        assert!(GateSettingsPanel::load(&path).is_err());
    }
}
