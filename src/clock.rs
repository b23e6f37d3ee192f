//! Pause-aware session timing and the metrics derived from it.

use std::time::SystemTime;

use crate::session::SessionState;

/// Seconds of active typing time at `now`, excluding every pause.
///
/// Zero for a session that is not active or never started; never negative.
pub fn elapsed_time(state: &SessionState, now: SystemTime) -> f64 {
    if !state.active {
        return 0.0;
    }
    let Some(start) = state.start_time else {
        return 0.0;
    };

    let current_pause = if state.paused {
        state
            .pause_start_time
            .map(|p| secs_between(p, now))
            .unwrap_or(0.0)
    } else {
        0.0
    };

    let elapsed =
        secs_between(start, now) - state.total_paused_duration.as_secs_f64() - current_pause;
    elapsed.max(0.0)
}

/// Words per minute with the usual five characters per word.
pub fn wpm(total_chars_typed: u64, elapsed_seconds: f64) -> u32 {
    if elapsed_seconds.is_nan() || elapsed_seconds <= 0.0 {
        return 0;
    }
    ((total_chars_typed as f64 / 5.0) / (elapsed_seconds / 60.0)).round() as u32
}

/// Percentage of correct keystrokes, 100 until something has been typed.
pub fn accuracy(total_chars_typed: u64, total_errors: u64) -> u32 {
    if total_chars_typed == 0 {
        return 100;
    }
    let attempts = (total_chars_typed + total_errors) as f64;
    (100.0 * total_chars_typed as f64 / attempts).round() as u32
}

/// `m:ss`, e.g. `65.0` -> `1:05`.
pub fn format_time(seconds: f64) -> String {
    let whole = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", whole / 60, whole % 60)
}

fn secs_between(earlier: SystemTime, later: SystemTime) -> f64 {
    later
        .duration_since(earlier)
        .unwrap_or_default()
        .as_secs_f64()
}
