//! Elapsed-time accounting for trackers.
//!
//! A tracker is either stopped, with everything it has measured folded into
//! `total_time`, or running, in which case the seconds since its anchor (the
//! open session's `start_time`) are still outstanding. The functions here are
//! pure: handlers load the rows, ask what a transition does, and write the
//! result back in one transaction.
//!
//! All durations are whole seconds. Millisecond spans are truncated, and a
//! span that comes out negative (clock skew between writers) counts as zero.

use chrono::{Duration, NaiveDateTime};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Tracker already running")]
    AlreadyRunning,

    #[error("Tracker not running")]
    NotRunning,
}

/// The open session of a running tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenSession {
    /// Instant from which outstanding time is counted.
    pub anchor: NaiveDateTime,
    /// Seconds already folded into the tracker by earlier syncs.
    pub duration: i64,
}

/// Result of stopping a running tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stopped {
    pub seconds: i64,
    pub total_time: i64,
    pub session_duration: i64,
    pub end_time: NaiveDateTime,
}

/// Result of syncing a running tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Synced {
    pub seconds: i64,
    pub total_time: i64,
    pub session_duration: i64,
    pub anchor: NaiveDateTime,
}

/// Whole seconds from `from` to `to`, truncated, never negative.
pub fn whole_seconds(from: NaiveDateTime, to: NaiveDateTime) -> i64 {
    ((to - from).num_milliseconds() / 1000).max(0)
}

/// Opens a new session at `now`. Returns the anchor for the tracker and the
/// session.
pub fn start(open: Option<&OpenSession>, now: NaiveDateTime) -> Result<NaiveDateTime, TransitionError> {
    match open {
        Some(_) => Err(TransitionError::AlreadyRunning),
        None => Ok(now),
    }
}

pub fn stop(
    total_time: i64,
    open: Option<&OpenSession>,
    now: NaiveDateTime,
) -> Result<Stopped, TransitionError> {
    let open = open.ok_or(TransitionError::NotRunning)?;
    let seconds = whole_seconds(open.anchor, now);

    Ok(Stopped {
        seconds,
        total_time: total_time + seconds,
        session_duration: open.duration + seconds,
        end_time: now,
    })
}

/// Folds the outstanding whole seconds into the total without closing the
/// session. The anchor moves forward by exactly the seconds counted, so the
/// sub-second remainder is still outstanding afterwards and repeated syncs
/// never lose time to truncation.
pub fn sync(
    total_time: i64,
    open: Option<&OpenSession>,
    now: NaiveDateTime,
) -> Result<Synced, TransitionError> {
    let open = open.ok_or(TransitionError::NotRunning)?;
    let seconds = whole_seconds(open.anchor, now);

    Ok(Synced {
        seconds,
        total_time: total_time + seconds,
        session_duration: open.duration + seconds,
        anchor: open.anchor + Duration::seconds(seconds),
    })
}

/// Time measured so far, including the outstanding part of a running
/// tracker. This is the only figure clients should display.
pub fn elapsed_seconds(
    total_time: i64,
    is_running: bool,
    start_time: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> i64 {
    match (is_running, start_time) {
        (true, Some(anchor)) => total_time + whole_seconds(anchor, now),
        _ => total_time,
    }
}

/// Percentage of `goal` covered by `seconds`, rounded and capped at 100.
pub fn progress_percent(seconds: i64, goal: Option<i64>) -> Option<u8> {
    let goal = goal.filter(|g| *g > 0)?;
    let percent = (100.0 * seconds.max(0) as f64 / goal as f64).round();
    Some(percent.min(100.0) as u8)
}

/// `1h 02m 03s`, `4m 05s` or `6s`.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}
