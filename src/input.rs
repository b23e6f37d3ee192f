//! Per-keystroke state machine: Idle -> Running <-> Paused -> Complete.
//!
//! Each call handles exactly one key event to completion. Transitions only
//! touch the [`SessionState`] they are given and report what happened through
//! a [`SessionObserver`]; scheduling the delayed line completion and
//! performing a reset belong to the caller.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::SystemTime;

use crate::events::{SessionEvent, SessionObserver};
use crate::session::{SessionPhase, SessionState};
use crate::snippet::Line;

pub const PAUSE_KEY: KeyCode = KeyCode::Tab;
pub const RESET_KEY: KeyCode = KeyCode::Esc;

/// What a key means in the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    TogglePause,
    Reset,
    Type(char),
    Ignore,
}

/// Result of feeding one key event to [`handle_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Ignored,
    Handled,
    /// The last character of the current line was typed; a line completion is due.
    LineFinished,
    ResetRequested,
}

/// Result of [`advance_line`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAdvance {
    NextLine,
    TestFinished,
}

pub fn classify(key: &KeyEvent, phase: SessionPhase) -> KeyAction {
    if key.kind != KeyEventKind::Press {
        return KeyAction::Ignore;
    }
    // a paused session resets on any esc, modifiers or not
    if phase == SessionPhase::Paused && key.code == RESET_KEY {
        return KeyAction::Reset;
    }
    let held = KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER | KeyModifiers::META;
    if key.modifiers.intersects(held) {
        return KeyAction::Ignore;
    }

    if key.code == RESET_KEY {
        return KeyAction::Reset;
    }
    if key.code == PAUSE_KEY {
        return match phase {
            SessionPhase::Running | SessionPhase::Paused => KeyAction::TogglePause,
            _ => KeyAction::Ignore,
        };
    }

    match phase {
        SessionPhase::Idle | SessionPhase::Running => match key.code {
            KeyCode::Char(c) if !c.is_control() => KeyAction::Type(c),
            KeyCode::Enter => KeyAction::Type('\n'),
            _ => KeyAction::Ignore,
        },
        SessionPhase::Paused | SessionPhase::Complete => KeyAction::Ignore,
    }
}

/// Feed one key event through the state machine.
pub fn handle_key<O: SessionObserver + ?Sized>(
    state: &mut SessionState,
    lines: &[Line],
    key: &KeyEvent,
    now: SystemTime,
    observer: &mut O,
) -> KeyOutcome {
    match classify(key, state.phase()) {
        KeyAction::Ignore => KeyOutcome::Ignored,
        KeyAction::Reset => {
            observer.notify(SessionEvent::ResetRequested);
            KeyOutcome::ResetRequested
        }
        KeyAction::TogglePause => {
            toggle_pause(state, now, observer);
            KeyOutcome::Handled
        }
        KeyAction::Type(c) => {
            if state.phase() == SessionPhase::Idle {
                start(state, now, observer);
            }
            type_char(state, lines, c, observer)
        }
    }
}

pub fn start<O: SessionObserver + ?Sized>(
    state: &mut SessionState,
    now: SystemTime,
    observer: &mut O,
) {
    state.active = true;
    state.start_time = Some(now);
    tracing::info!(line = state.current_line_index, "typing test started");
    observer.notify(SessionEvent::TestStarted);
}

/// Pause a running session or resume a paused one. No-op in other phases.
pub fn toggle_pause<O: SessionObserver + ?Sized>(
    state: &mut SessionState,
    now: SystemTime,
    observer: &mut O,
) {
    match state.phase() {
        SessionPhase::Running => {
            state.paused = true;
            state.pause_start_time = Some(now);
        }
        SessionPhase::Paused => close_pause(state, now),
        SessionPhase::Idle | SessionPhase::Complete => {
            tracing::debug!("cannot pause: test not active");
            return;
        }
    }
    tracing::debug!(paused = state.paused, "pause toggled");
    observer.notify(SessionEvent::PauseToggled {
        paused: state.paused,
    });
}

/// Fold an open pause into `total_paused_duration`, in any phase.
pub fn close_pause(state: &mut SessionState, now: SystemTime) {
    if let Some(start) = state.pause_start_time.take() {
        state.total_paused_duration += now.duration_since(start).unwrap_or_default();
    }
    state.paused = false;
}

/// Match `c` against the next expected character of the current line.
pub fn type_char<O: SessionObserver + ?Sized>(
    state: &mut SessionState,
    lines: &[Line],
    c: char,
    observer: &mut O,
) -> KeyOutcome {
    let Some(line) = lines.get(state.current_line_index) else {
        return KeyOutcome::Ignored;
    };
    let Some(expected) = line.expected_char(state.current_char_index) else {
        return KeyOutcome::Ignored;
    };

    if c == expected {
        state.current_char_index += 1;
        state.total_chars_typed += 1;
        state.error_on_current_char = false;
        observer.notify(SessionEvent::CharTyped { correct: true });

        if state.current_char_index == line.typing_len() {
            return KeyOutcome::LineFinished;
        }
    } else {
        state.total_errors += 1;
        state.error_on_current_char = true;
        observer.notify(SessionEvent::CharTyped { correct: false });
    }
    KeyOutcome::Handled
}

/// Complete the current line and move to the next one that has something to type.
///
/// Lines with an empty typing sequence are marked completed on the way. Running
/// past the last line finishes the test.
pub fn advance_line<O: SessionObserver + ?Sized>(
    state: &mut SessionState,
    lines: &[Line],
    now: SystemTime,
    observer: &mut O,
) -> LineAdvance {
    state.completed_lines.insert(state.current_line_index);
    state.current_line_index += 1;
    state.current_char_index = 0;
    state.error_on_current_char = false;

    while let Some(line) = lines.get(state.current_line_index) {
        if line.is_typeable() {
            break;
        }
        state.completed_lines.insert(state.current_line_index);
        state.current_line_index += 1;
    }

    if state.current_line_index >= lines.len() {
        state.end_time = Some(now);
        tracing::info!(
            chars = state.total_chars_typed,
            errors = state.total_errors,
            "typing test completed"
        );
        observer.notify(SessionEvent::TestCompleted);
        return LineAdvance::TestFinished;
    }

    tracing::debug!(line = state.current_line_index, "line completed");
    observer.notify(SessionEvent::LineCompleted);
    LineAdvance::NextLine
}

/// Move the cursor to the first typeable line at or after the current one,
/// without marking anything completed.
pub fn skip_to_typeable_line(state: &mut SessionState, lines: &[Line]) {
    while lines
        .get(state.current_line_index)
        .is_some_and(|line| !line.is_typeable())
    {
        state.current_line_index += 1;
    }
}
