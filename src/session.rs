use std::collections::BTreeSet;
use std::time::{Duration, SystemTime};

/// Where a typing session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SessionPhase {
    Idle,
    Running,
    Paused,
    Complete,
}

/// Mutable progress of one typing session.
///
/// Created zeroed on (re)start and only changed through the transitions in
/// [`crate::input`], which the [`crate::controller::SessionController`] drives.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub active: bool,
    pub paused: bool,
    pub start_time: Option<SystemTime>,
    pub end_time: Option<SystemTime>,
    pub pause_start_time: Option<SystemTime>,
    pub total_paused_duration: Duration,
    pub current_line_index: usize,
    pub current_char_index: usize,
    pub total_chars_typed: u64,
    pub total_errors: u64,
    pub completed_lines: BTreeSet<usize>,
    pub error_on_current_char: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            active: false,
            paused: false,
            start_time: None,
            end_time: None,
            pause_start_time: None,
            total_paused_duration: Duration::ZERO,
            current_line_index: 0,
            current_char_index: 0,
            total_chars_typed: 0,
            total_errors: 0,
            completed_lines: BTreeSet::new(),
            error_on_current_char: false,
        }
    }
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        if self.end_time.is_some() {
            SessionPhase::Complete
        } else if !self.active {
            SessionPhase::Idle
        } else if self.paused {
            SessionPhase::Paused
        } else {
            SessionPhase::Running
        }
    }

    pub fn is_complete(&self) -> bool {
        self.phase() == SessionPhase::Complete
    }
}
