mod alarm_store;
mod config;
pub mod migrations;

pub use alarm_store::{
    export_alarms, import_alarms, AlarmStore, ImportReport, MemoryAlarmStore, SkippedAlarm,
    SqliteAlarmStore,
};
pub use config::{
    AudioConfig, Config, DefaultsConfig, LoggingConfig, QuizConfig, SchedulerConfig,
};

use std::path::PathBuf;

/// Returns the data directory, creating it if needed.
///
/// `QUIZALARM_DATA_DIR` overrides the location outright; otherwise
/// `~/.config/quizalarm[-dev]/` based on QUIZALARM_ENV.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let dir = match std::env::var_os("QUIZALARM_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("QUIZALARM_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("quizalarm-dev")
            } else {
                base_dir.join("quizalarm")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
