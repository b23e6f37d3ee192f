//! Single owner of a typing session.
//!
//! All session mutation funnels through [`SessionController`]: key handling,
//! the deferred line completion, pause, reset and typing mode switches. The
//! deferred completion carries the generation it was scheduled in; reset and
//! typing mode switches bump the generation so a completion scheduled against
//! older state never fires.

use crossterm::event::KeyEvent;
use std::time::{Duration, SystemTime};

use crate::clock;
use crate::events::SessionObserver;
use crate::exclusion;
use crate::input::{self, KeyOutcome, LineAdvance};
use crate::preset::{Language, Preset};
use crate::session::{SessionPhase, SessionState};
use crate::snippet::{Line, SnippetData, SnippetInfo};
use crate::stats::ResultRecorder;

/// Time the last typed character of a line stays on screen before the line advances.
pub const LINE_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// A line completion waiting for the settle delay to pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCompletion {
    pub generation: u64,
    pub due_at: SystemTime,
}

/// Final numbers of a finished test.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub wpm: u32,
    pub accuracy: u32,
    pub elapsed_secs: f64,
    pub time_display: String,
}

/// Numbers for the stats bar while typing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveStats {
    pub language: Language,
    pub preset_name: &'static str,
    /// 1-based line position.
    pub line: usize,
    pub total_lines: usize,
    pub char_progress: String,
    pub wpm: u32,
    pub accuracy: u32,
}

pub struct SessionController<O: SessionObserver> {
    raw: SnippetData,
    info: SnippetInfo,
    preset: Preset,
    lines: Vec<Line>,
    state: SessionState,
    observer: O,
    generation: u64,
    pending: Option<PendingCompletion>,
    settle_delay: Duration,
    recorder: Option<Box<dyn ResultRecorder>>,
    result: Option<TestResult>,
}

impl<O: SessionObserver> SessionController<O> {
    pub fn new(raw: SnippetData, info: SnippetInfo, preset: Preset, observer: O) -> Self {
        let lines = exclusion::apply_to_snippet(&raw, preset).lines;
        let mut controller = Self {
            raw,
            info,
            preset,
            lines,
            state: SessionState::default(),
            observer,
            generation: 0,
            pending: None,
            settle_delay: LINE_SETTLE_DELAY,
            recorder: None,
            result: None,
        };
        controller.reset();
        controller
    }

    pub fn with_recorder(mut self, recorder: Box<dyn ResultRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn current_line(&self) -> Option<&Line> {
        self.lines.get(self.state.current_line_index)
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    pub fn language(&self) -> Language {
        self.raw.language
    }

    pub fn info(&self) -> &SnippetInfo {
        &self.info
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pending(&self) -> Option<PendingCompletion> {
        self.pending
    }

    pub fn result(&self) -> Option<&TestResult> {
        self.result.as_ref()
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Process one key event to completion.
    pub fn handle_key(&mut self, key: &KeyEvent, now: SystemTime) -> KeyOutcome {
        let outcome =
            input::handle_key(&mut self.state, &self.lines, key, now, &mut self.observer);
        match outcome {
            KeyOutcome::LineFinished => {
                self.pending = Some(PendingCompletion {
                    generation: self.generation,
                    due_at: now + self.settle_delay,
                });
            }
            KeyOutcome::ResetRequested => self.reset(),
            KeyOutcome::Handled | KeyOutcome::Ignored => {}
        }
        outcome
    }

    /// Fire the pending line completion once its delay has passed.
    ///
    /// Nothing advances while the session is paused. Returns whether a line
    /// completion ran.
    pub fn poll(&mut self, now: SystemTime) -> bool {
        match self.pending {
            Some(pending) if now >= pending.due_at && !self.state.paused => {
                self.complete_line(pending.generation, now)
            }
            _ => false,
        }
    }

    /// Run a line completion scheduled in `generation`. Stale generations are dropped.
    pub fn complete_line(&mut self, generation: u64, now: SystemTime) -> bool {
        if generation != self.generation {
            tracing::debug!(
                generation,
                current = self.generation,
                "dropping stale line completion"
            );
            return false;
        }
        self.pending = None;

        let line_done = self
            .current_line()
            .is_some_and(|line| self.state.current_char_index >= line.typing_len());
        if self.phase() != SessionPhase::Running || !line_done {
            return false;
        }

        match input::advance_line(&mut self.state, &self.lines, now, &mut self.observer) {
            LineAdvance::NextLine => {}
            LineAdvance::TestFinished => self.finish(now),
        }
        true
    }

    pub fn toggle_pause(&mut self, now: SystemTime) {
        input::toggle_pause(&mut self.state, now, &mut self.observer);
    }

    /// Start over on the same snippet with a fresh session.
    pub fn reset(&mut self) {
        self.state = SessionState::default();
        self.generation += 1;
        self.pending = None;
        self.result = None;
        input::skip_to_typeable_line(&mut self.state, &self.lines);
        tracing::info!(
            generation = self.generation,
            first_line = self.state.current_line_index,
            "session reset"
        );
    }

    /// Switch typing mode mid-session.
    ///
    /// The lines are filtered again from the raw snippet. Progress inside the
    /// current line is not carried over: the line restarts from its first
    /// character, and a line left with nothing to type is completed right away.
    pub fn set_preset(&mut self, preset: Preset, now: SystemTime) {
        self.preset = preset;
        self.lines = exclusion::apply_to_snippet(&self.raw, preset).lines;
        self.generation += 1;
        self.pending = None;
        self.state.current_char_index = 0;
        self.state.error_on_current_char = false;

        match self.phase() {
            SessionPhase::Idle => {
                self.state.current_line_index = 0;
                input::skip_to_typeable_line(&mut self.state, &self.lines);
            }
            SessionPhase::Running | SessionPhase::Paused => {
                let typeable = self.current_line().is_some_and(Line::is_typeable);
                if !typeable {
                    let advance = input::advance_line(
                        &mut self.state,
                        &self.lines,
                        now,
                        &mut self.observer,
                    );
                    if advance == LineAdvance::TestFinished {
                        self.finish(now);
                    }
                }
            }
            SessionPhase::Complete => {}
        }
        tracing::info!(preset = %preset, "typing mode changed");
    }

    /// Load a different snippet and reset.
    pub fn replace_snippet(&mut self, raw: SnippetData, info: SnippetInfo) {
        self.lines = exclusion::apply_to_snippet(&raw, self.preset).lines;
        self.raw = raw;
        self.info = info;
        self.reset();
    }

    pub fn elapsed(&self, now: SystemTime) -> f64 {
        clock::elapsed_time(&self.state, now)
    }

    pub fn live_stats(&self, now: SystemTime) -> LiveStats {
        let char_progress = match self.current_line() {
            Some(line) => format!("{}/{}", self.state.current_char_index, line.typing_len()),
            None => "0/0".to_string(),
        };
        let wpm = if self.phase() == SessionPhase::Running {
            clock::wpm(self.state.total_chars_typed, self.elapsed(now))
        } else {
            0
        };

        LiveStats {
            language: self.language(),
            preset_name: self.preset.display_name(),
            line: self.state.current_line_index + 1,
            total_lines: self.raw.total_lines,
            char_progress,
            wpm,
            accuracy: clock::accuracy(self.state.total_chars_typed, self.state.total_errors),
        }
    }

    fn finish(&mut self, now: SystemTime) {
        input::close_pause(&mut self.state, now);
        let elapsed_secs = clock::elapsed_time(&self.state, now);
        let result = TestResult {
            wpm: clock::wpm(self.state.total_chars_typed, elapsed_secs),
            accuracy: clock::accuracy(self.state.total_chars_typed, self.state.total_errors),
            elapsed_secs,
            time_display: clock::format_time(elapsed_secs),
        };
        self.state.active = false;

        if let (Some(recorder), Some(id)) = (self.recorder.as_mut(), self.info.id.as_deref()) {
            if let Err(err) = recorder.record_result(id, result.wpm, result.accuracy) {
                tracing::warn!(snippet = id, %err, "could not record practice result");
            }
        }
        tracing::info!(
            wpm = result.wpm,
            accuracy = result.accuracy,
            time = %result.time_display,
            "test result"
        );
        self.result = Some(result);
    }
}
