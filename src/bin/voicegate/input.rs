use crossbeam_channel::Sender;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use voicegate::log_debug;

/// How long the reader waits for a key before checking the stop flag.
const INPUT_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputEvent {
    SelectUp,
    SelectDown,
    Increase,
    Decrease,
    ToggleBypass,
    Reset,
    Save,
    Exit,
}

pub(crate) fn map_key(key: KeyEvent) -> Option<InputEvent> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c') | KeyCode::Char('d'))
            .then_some(InputEvent::Exit);
    }
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => Some(InputEvent::SelectUp),
        KeyCode::Down | KeyCode::Char('j') => Some(InputEvent::SelectDown),
        KeyCode::Right | KeyCode::Char('+') | KeyCode::Char('=') => Some(InputEvent::Increase),
        KeyCode::Left | KeyCode::Char('-') => Some(InputEvent::Decrease),
        KeyCode::Char(' ') | KeyCode::Char('b') => Some(InputEvent::ToggleBypass),
        KeyCode::Char('r') => Some(InputEvent::Reset),
        KeyCode::Char('s') => Some(InputEvent::Save),
        KeyCode::Char('q') | KeyCode::Esc => Some(InputEvent::Exit),
        _ => None,
    }
}

pub(crate) fn spawn_input_thread(
    tx: Sender<InputEvent>,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            match event::poll(INPUT_POLL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(err) => {
                    log_debug(&format!("terminal poll error: {err}"));
                    break;
                }
            }
            let key = match event::read() {
                Ok(Event::Key(key)) => key,
                Ok(_) => continue,
                Err(err) => {
                    log_debug(&format!("terminal read error: {err}"));
                    break;
                }
            };
            if let Some(input) = map_key(key) {
                if tx.send(input).is_err() {
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn arrows_and_letters_map_to_panel_actions() {
        assert_eq!(map_key(press(KeyCode::Up)), Some(InputEvent::SelectUp));
        assert_eq!(map_key(press(KeyCode::Char('j'))), Some(InputEvent::SelectDown));
        assert_eq!(map_key(press(KeyCode::Right)), Some(InputEvent::Increase));
        assert_eq!(map_key(press(KeyCode::Char('-'))), Some(InputEvent::Decrease));
        assert_eq!(map_key(press(KeyCode::Char(' '))), Some(InputEvent::ToggleBypass));
        assert_eq!(map_key(press(KeyCode::Char('x'))), None);
    }

    #[test]
    fn ctrl_c_and_escape_exit() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(map_key(ctrl_c), Some(InputEvent::Exit));
        assert_eq!(map_key(press(KeyCode::Esc)), Some(InputEvent::Exit));
        let ctrl_r = KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL);
        assert_eq!(map_key(ctrl_r), None);
    }

    #[test]
    fn key_releases_are_ignored() {
        let mut release = press(KeyCode::Char('q'));
        release.kind = KeyEventKind::Release;
        assert_eq!(map_key(release), None);
    }
}
