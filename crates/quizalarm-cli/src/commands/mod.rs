pub mod alarm;
pub mod config;
pub mod problems;
pub mod run;

use quizalarm_core::{data_dir, Config, JsonProblemRepository, SqliteAlarmStore};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Alarm database at `<data_dir>/alarms.db`.
pub fn open_store() -> Result<SqliteAlarmStore, Box<dyn std::error::Error>> {
    let path = data_dir()?.join("alarms.db");
    Ok(SqliteAlarmStore::open(&path)?)
}

pub fn problem_repository(config: &Config) -> Result<JsonProblemRepository, Box<dyn std::error::Error>> {
    Ok(JsonProblemRepository::new(config.problems_dir(&data_dir()?)))
}

/// Split "a, b,c" into trimmed, non-empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
