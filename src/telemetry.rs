//! Structured JSON trace output. Lifecycle events from the graph controller
//! land here when `--logs` or `--log-timings` is on.

use crate::audio::GraphStats;
use crate::config::AppConfig;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

pub fn tracing_log_path() -> PathBuf {
    env::var("VOICEGATE_TRACE_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("voicegate_trace.jsonl"))
}

pub fn tracing_enabled(config: &AppConfig) -> bool {
    (config.logs || config.log_timings) && !config.no_logs
}

/// Install the JSON-lines subscriber. Only the first call per process has an effect.
pub fn init_tracing(config: &AppConfig) {
    if !tracing_enabled(config) {
        return;
    }

    let _ = TRACING_INIT.get_or_init(|| {
        let path = tracing_log_path();
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => file,
            Err(_) => return,
        };
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_timer(UtcTime::rfc_3339())
            .with_writer(file)
            .with_current_span(false)
            .with_span_list(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// One summary event per session, written just before the graph is released.
pub fn trace_session_summary(device: &str, stats: GraphStats, elapsed: Duration) {
    let faulted_pct = if stats.blocks == 0 {
        0.0
    } else {
        stats.faulted_blocks as f64 * 100.0 / stats.blocks as f64
    };
    tracing::info!(
        event = "session_summary",
        device,
        blocks = stats.blocks,
        faulted_blocks = stats.faulted_blocks,
        faulted_pct,
        dropped_samples = stats.dropped_samples,
        elapsed_ms = elapsed.as_millis() as u64,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn no_logs_wins_over_timings() {
        let cfg = AppConfig::parse_from(["test-app", "--log-timings", "--no-logs"]);
        assert!(!tracing_enabled(&cfg));
        let cfg = AppConfig::parse_from(["test-app", "--log-timings"]);
        assert!(tracing_enabled(&cfg));
    }

    #[test]
    fn trace_path_defaults_to_temp_dir() {
        if env::var("VOICEGATE_TRACE_LOG").is_err() {
            assert_eq!(
                tracing_log_path(),
                env::temp_dir().join("voicegate_trace.jsonl")
            );
        }
    }
}
