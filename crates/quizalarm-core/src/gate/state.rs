use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alarm::Alarm;
use crate::problem::Problem;
use crate::quiz::SessionStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateState {
    #[default]
    Idle,
    Active,
    Snoozed,
}

/// Result of submitting an answer through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// Correct answer; the alarm is dismissed.
    Dismissed,
    /// Wrong answer; the next problem is shown after the result display.
    Incorrect { remaining: usize },
    /// Wrong answer on the last problem; the alarm is dismissed without success.
    Exhausted,
    /// The activation has no problems to answer.
    NoProblems,
    /// A previous result is still on display.
    AwaitingNextProblem,
    /// The gate is not Active.
    NotActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SnoozeOutcome {
    /// `until` is `None` when the deadline is past the representable range.
    Snoozed { until: Option<DateTime<Utc>> },
    /// The alarm does not allow snoozing.
    Disabled,
    /// `snooze.max_count` snoozes were already taken in this activation.
    LimitReached,
    NotActive,
}

/// Transient result shown between a wrong answer and the next problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Incorrect,
}

/// Everything a presentation layer needs to render the gate.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GateSnapshot {
    pub state: GateState,
    pub alarm: Option<Alarm>,
    /// Hidden while a result is on display.
    pub problem: Option<Problem>,
    pub feedback: Option<Feedback>,
    pub stats: Option<SessionStats>,
    pub progress: f64,
    pub snooze_count: u32,
    pub snoozed_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct GateSettings {
    /// How long a wrong-answer result stays up before the next problem.
    pub result_display: Duration,
    /// Number of events kept in the transition history.
    pub history_limit: usize,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            result_display: Duration::from_millis(2000),
            history_limit: 256,
        }
    }
}
