//! VoiceGate entrypoint: opens the microphone through the noise gate and shows a
//! live meter with the gate settings.
//!
//! # Architecture
//!
//! - Audio thread (owned by the device): gate + meter + output ring
//! - Sink thread: drains the cleaned stream, optionally into a WAV file
//! - Input thread: maps key presses to panel actions
//! - Main thread: owns the controller, applies input, redraws at meter rate

mod cli_utils;
mod input;
mod meter;
mod sink;

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::{bounded, RecvTimeoutError};
use crossterm::{
    cursor::MoveToColumn,
    queue,
    style::Print,
    terminal::{size as terminal_size, Clear, ClearType},
};
use std::cell::RefCell;
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use voicegate::audio::{
    AudioGraphController, CpalHost, GraphSettings, ProcessorRegistry, TurnConfig, TurnController,
    TurnEvent,
};
use voicegate::config::AppConfig;
use voicegate::settings::GateSettingsPanel;
use voicegate::telemetry::{init_tracing, trace_session_summary};
use voicegate::terminal_restore::TerminalRestoreGuard;
use voicegate::{init_logging, log_debug, log_file_path};

use cli_utils::list_input_devices;
use input::{spawn_input_thread, InputEvent};
use meter::{fit_to_width, format_status_line, MeterConfig, StatusView};
use sink::{spawn_stream_sink, StreamSink};

const DEFAULT_TERMINAL_WIDTH: u16 = 120;

fn main() -> Result<()> {
    let mut config = AppConfig::parse();
    if config.list_input_devices {
        list_input_devices()?;
        return Ok(());
    }

    config.validate()?;
    init_logging(&config);
    init_tracing(&config);
    log_debug("=== VoiceGate Started ===");
    log_debug(&format!("Log file: {:?}", log_file_path()));

    let initial = config.initial_parameters()?;
    let host = CpalHost::new(config.input_device.as_deref());
    let mut controller = AudioGraphController::new(
        Box::new(host),
        ProcessorRegistry::with_builtin(),
        GraphSettings::from(&config),
        initial,
    );

    let ready: Rc<RefCell<Option<Result<StreamSink>>>> = Rc::new(RefCell::new(None));
    let ready_slot = ready.clone();
    let record_path = config.record_wav.clone();
    controller.on_processed_stream_ready(move |stream| {
        *ready_slot.borrow_mut() = Some(spawn_stream_sink(stream, record_path.as_deref()));
    });

    match controller.enable() {
        Ok(None) => {}
        Ok(Some(warning)) => eprintln!("{}", warning.user_message()),
        Err(err) => {
            eprintln!("{}", err.user_message());
            return Err(err.into());
        }
    }
    let sink = ready.borrow_mut().take().transpose()?;
    if config.bypass {
        controller.set_bypassed(true)?;
    }

    let device = controller.device_label().unwrap_or("unknown").to_string();
    if let Some(format) = controller.stream_format() {
        println!(
            "Listening on {device} ({} Hz, {} ch).",
            format.sample_rate, format.channels
        );
    }
    println!("Keys: up/down select, left/right adjust, space bypass, r reset, s save, q quit");

    let started = Instant::now();
    let session = run_ui(&config, &mut controller);

    trace_session_summary(&device, controller.stats(), started.elapsed());
    controller.disable();
    log_debug("=== VoiceGate Stopped ===");

    if let Some(sink) = sink {
        let record_path = sink.record_path().map(Path::to_path_buf);
        let samples = sink.finish()?;
        if let Some(path) = record_path {
            println!("Recorded {samples} samples to {}", path.display());
        }
    }
    session
}

fn run_ui(config: &AppConfig, controller: &mut AudioGraphController) -> Result<()> {
    let guard = TerminalRestoreGuard::new();
    guard.enable_raw_mode()?;
    let mut stdout = io::stdout();
    guard.hide_cursor(&mut stdout)?;

    let (tx, rx) = bounded(32);
    let input_stop = Arc::new(AtomicBool::new(false));
    let input_thread = spawn_input_thread(tx, input_stop.clone());

    let tick = Duration::from_millis(config.meter_interval_ms);
    let meter = controller.volume_meter();
    let meter_config = MeterConfig::default();
    let mut panel = GateSettingsPanel::new(controller.parameters());
    let mut turns = TurnController::new(TurnConfig::from(config));
    let mut notice: Option<String> = None;
    let mut last_tick = Instant::now();

    let result = loop {
        match rx.recv_timeout(tick) {
            Ok(event) => match apply_input(event, controller, &mut panel, config) {
                Ok(Some(message)) => notice = Some(message),
                Ok(None) => break Ok(()),
                Err(err) => break Err(err),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break Ok(()),
        }

        let elapsed = last_tick.elapsed();
        if elapsed >= tick {
            last_tick = Instant::now();
            match turns.sample(&meter, elapsed.as_millis() as u64) {
                Some(TurnEvent::SpeechStarted) => log_debug("turn: speech started"),
                Some(TurnEvent::SpeechEnded { speech_ms }) => {
                    log_debug(&format!("turn: speech ended after {speech_ms} ms"))
                }
                None => {}
            }
            if let Some(warning) = controller.poll_warning() {
                notice = Some(warning.user_message());
            }
        }

        let view = StatusView {
            level_db: meter.level_db(),
            params: panel.params(),
            selected: panel.selected_item(),
            state: controller.state(),
            speaking: turns.is_speaking(),
            notice: notice.as_deref(),
        };
        if let Err(err) = draw_line(&mut stdout, &format_status_line(&view, &meter_config)) {
            break Err(err.into());
        }
    };

    input_stop.store(true, Ordering::Relaxed);
    guard.restore();
    println!();
    if input_thread.join().is_err() {
        log_debug("input thread panicked");
    }
    result
}

/// Apply one key action. `Ok(None)` means quit; otherwise a status notice.
fn apply_input(
    event: InputEvent,
    controller: &mut AudioGraphController,
    panel: &mut GateSettingsPanel,
    config: &AppConfig,
) -> Result<Option<String>> {
    let message = match event {
        InputEvent::Exit => return Ok(None),
        InputEvent::SelectUp => {
            panel.move_up();
            format!("{} selected", panel.selected_item().label())
        }
        InputEvent::SelectDown => {
            panel.move_down();
            format!("{} selected", panel.selected_item().label())
        }
        InputEvent::Increase | InputEvent::Decrease => {
            let steps = if event == InputEvent::Increase { 1 } else { -1 };
            let applied = panel.adjust_selected(controller, steps);
            let item = panel.selected_item();
            format!("{} {}", item.label(), item.format_value(&applied))
        }
        InputEvent::Reset => {
            panel.reset_to_defaults(controller);
            "defaults restored".to_string()
        }
        InputEvent::ToggleBypass => match controller.toggle() {
            Ok(true) => "gate bypassed".to_string(),
            Ok(false) => "gate active".to_string(),
            Err(err) => err.user_message(),
        },
        InputEvent::Save => match config.settings_file.as_deref() {
            Some(path) => {
                panel.save(path)?;
                format!("saved to {}", path.display())
            }
            None => "set --settings-file to save".to_string(),
        },
    };
    Ok(Some(message))
}

fn draw_line(stdout: &mut impl Write, line: &str) -> io::Result<()> {
    let width = terminal_size()
        .map(|(cols, _)| cols)
        .unwrap_or(DEFAULT_TERMINAL_WIDTH);
    queue!(
        stdout,
        MoveToColumn(0),
        Clear(ClearType::CurrentLine),
        Print(fit_to_width(line, usize::from(width)))
    )?;
    stdout.flush()
}
