mod matcher;
mod model;

pub use matcher::{
    should_trigger, DEFAULT_POLL_INTERVAL_SECS, FIRE_WINDOW_SECS, MAX_POLL_INTERVAL_SECS,
    SUPPRESSION_SECS,
};
pub use model::{
    Alarm, AlarmTime, Difficulty, SnoozeConfig, SoundConfig, Weekday, MAX_SNOOZE_SECS,
};
