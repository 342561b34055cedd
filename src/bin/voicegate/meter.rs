//! One-line status display: level bar, gate state, and the settings panel.

use voicegate::audio::{GraphState, METER_FLOOR_DB};
use voicegate::gate::ParameterSet;
use voicegate::settings::{SettingsItem, SETTINGS_ITEMS};

const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';
const THRESHOLD_MARKER: char = '│';

#[derive(Debug, Clone, Copy)]
pub(crate) struct MeterConfig {
    pub(crate) min_db: f32,
    pub(crate) max_db: f32,
    pub(crate) width: usize,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            min_db: METER_FLOOR_DB,
            max_db: 0.0,
            width: 24,
        }
    }
}

fn position(db: f32, config: &MeterConfig) -> usize {
    let range = config.max_db - config.min_db;
    let ratio = if db.is_finite() {
        ((db - config.min_db) / range).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (ratio * config.width as f32) as usize
}

/// Level bar with a marker where the gate threshold sits.
#[must_use]
pub(crate) fn format_level_meter(level_db: f32, threshold_db: f32, config: &MeterConfig) -> String {
    let filled = position(level_db, config);
    let marker = position(threshold_db, config).min(config.width.saturating_sub(1));
    (0..config.width)
        .map(|i| {
            if i == marker && i >= filled {
                THRESHOLD_MARKER
            } else if i < filled {
                BAR_FULL
            } else {
                BAR_EMPTY
            }
        })
        .collect()
}

pub(crate) struct StatusView<'a> {
    pub(crate) level_db: f32,
    pub(crate) params: ParameterSet,
    pub(crate) selected: SettingsItem,
    pub(crate) state: GraphState,
    pub(crate) speaking: bool,
    pub(crate) notice: Option<&'a str>,
}

#[must_use]
pub(crate) fn format_status_line(view: &StatusView<'_>, config: &MeterConfig) -> String {
    let bar = format_level_meter(view.level_db, view.params.threshold_db, config);
    let items: Vec<String> = SETTINGS_ITEMS
        .iter()
        .map(|item| {
            let cursor = if *item == view.selected { '>' } else { ' ' };
            format!("{cursor}{} {}", item.label(), item.format_value(&view.params))
        })
        .collect();
    let turn = match (view.state.is_active(), view.speaking) {
        (false, _) => "idle",
        (true, true) => "speaking",
        (true, false) => "quiet",
    };
    let mut line = format!(
        "[{bar}] {:>4.0} dB | {} | {} | {turn}",
        view.level_db.max(METER_FLOOR_DB),
        view.state.label(),
        items.join(" ")
    );
    if let Some(notice) = view.notice {
        line.push_str(" | ");
        line.push_str(notice);
    }
    line
}

/// Clip to the terminal width so the in-place redraw never wraps.
pub(crate) fn fit_to_width(line: &str, width: usize) -> String {
    line.chars().take(width.saturating_sub(1)).collect()
}
