//! # Quizalarm Core Library
//!
//! Core logic for an alarm clock that only goes quiet once a quiz has been
//! answered correctly. Everything the CLI does is available here; the
//! binary is a thin layer over the same types.
//!
//! ## Architecture
//!
//! - **Scheduler**: a background poll loop that fires each alarm at most
//!   once per matching day
//! - **Dismissal gate**: a single-threaded actor arbitrating activation,
//!   answers, snooze and stop, driven by callers and one-shot timers
//! - **Quiz**: problem sets loaded from JSON and scored by exact answer set
//! - **Storage**: SQLite alarm store and TOML configuration
//!
//! ## Key Components
//!
//! - [`AlarmScheduler`]: Poll loop with synchronous `stop()`
//! - [`DismissalGate`]: Idle / Active / Snoozed state machine
//! - [`QuizSession`]: Ordered problem sequence for one activation
//! - [`AlarmStore`]: Alarm persistence boundary
//! - [`Config`]: Application configuration management

pub mod alarm;
pub mod audio;
pub mod error;
pub mod events;
pub mod gate;
pub mod problem;
pub mod quiz;
pub mod scheduler;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use alarm::{should_trigger, Alarm, AlarmTime, Difficulty, SnoozeConfig, SoundConfig, Weekday};
pub use audio::{gateway_for, AudioBackend, AudioGateway, SilentAudio, SystemAudio};
pub use error::{AudioError, ConfigError, CoreError, StorageError, ValidationError};
pub use events::Event;
pub use gate::{
    AnswerOutcome, DismissalGate, GateHandle, GateSettings, GateSnapshot, GateState, SnoozeOutcome,
};
pub use problem::{JsonProblemRepository, MemoryProblemRepository, Problem, ProblemRepository};
pub use quiz::{QuizSession, SessionStats};
pub use scheduler::{AlarmScheduler, Clock, ManualClock, SystemClock, TickReport, TriggerDeduplicator};
pub use storage::{data_dir, AlarmStore, Config, MemoryAlarmStore, SqliteAlarmStore};
