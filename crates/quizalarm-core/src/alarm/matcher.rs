//! Decides whether an alarm should fire at a given instant.
//!
//! ## Window arithmetic
//!
//! ```text
//!            target - FIRE_WINDOW          target          target + FIRE_WINDOW
//!   ─────────────[────────────────────────────┼────────────────────────────]──────
//!                 <────────────── 2 * FIRE_WINDOW = SUPPRESSION ──────────>
//! ```
//!
//! A trigger recorded anywhere inside the window lies at most
//! `2 * FIRE_WINDOW_SECS` from any other instant of the same window, so the
//! suppression look-back covers the whole window. The scheduler must poll at
//! least every `MAX_POLL_INTERVAL_SECS` so several polls land inside it.

use chrono::{Datelike, NaiveDateTime};

use super::model::{Alarm, Weekday};

/// Half-width of the fire window around the scheduled time.
pub const FIRE_WINDOW_SECS: i64 = 30;

/// Look-back within which a previous trigger suppresses another one.
pub const SUPPRESSION_SECS: i64 = 2 * FIRE_WINDOW_SECS;

/// Longest poll interval that still lands at least four polls in a window.
pub const MAX_POLL_INTERVAL_SECS: u64 = (FIRE_WINDOW_SECS / 2) as u64;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Whether `alarm` is due at `now` (local wall-clock time).
pub fn should_trigger(alarm: &Alarm, now: NaiveDateTime) -> bool {
    if !alarm.enabled {
        return false;
    }
    if !alarm.days.contains(&Weekday::from(now.weekday())) {
        return false;
    }

    let target = alarm.time.on(now.date());
    let diff = (now - target).num_seconds().abs();

    if let Some(last) = alarm.last_triggered {
        let same_day = last.date() == now.date();
        let same_window = (last - target).num_seconds().abs() < SUPPRESSION_SECS;
        if same_day && same_window {
            return false;
        }
    }

    diff <= FIRE_WINDOW_SECS
}
