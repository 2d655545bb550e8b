use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gate::GateState;

/// Every state change in the system produces an Event.
/// The gate keeps a bounded history of them; the CLI prints them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    AlarmTriggered {
        alarm_id: String,
        label: String,
        at: DateTime<Utc>,
    },
    GateActivated {
        alarm_id: String,
        problem_count: usize,
        at: DateTime<Utc>,
    },
    /// A trigger arrived while another activation was in progress.
    ActivationIgnored {
        alarm_id: String,
        state: GateState,
        at: DateTime<Utc>,
    },
    AnswerAccepted {
        alarm_id: String,
        total_attempts: u32,
        at: DateTime<Utc>,
    },
    AnswerRejected {
        alarm_id: String,
        remaining: usize,
        at: DateTime<Utc>,
    },
    /// Result display elapsed and the next problem is shown.
    ProblemAdvanced {
        alarm_id: String,
        problem_index: usize,
        at: DateTime<Utc>,
    },
    SessionExhausted {
        alarm_id: String,
        total_attempts: u32,
        at: DateTime<Utc>,
    },
    Snoozed {
        alarm_id: String,
        snooze_count: u32,
        until: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
    SnoozeEnded {
        alarm_id: String,
        at: DateTime<Utc>,
    },
    GateStopped {
        alarm_id: Option<String>,
        at: DateTime<Utc>,
    },
    AudioFailed {
        alarm_id: String,
        message: String,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::AlarmTriggered { at, .. }
            | Event::GateActivated { at, .. }
            | Event::ActivationIgnored { at, .. }
            | Event::AnswerAccepted { at, .. }
            | Event::AnswerRejected { at, .. }
            | Event::ProblemAdvanced { at, .. }
            | Event::SessionExhausted { at, .. }
            | Event::Snoozed { at, .. }
            | Event::SnoozeEnded { at, .. }
            | Event::GateStopped { at, .. }
            | Event::AudioFailed { at, .. } => *at,
        }
    }
}
