//! Alarm record and its value types.
//!
//! The serde field names are the persisted round-trip contract shared by
//! the SQLite store, JSON import/export and the CLI's `--json` output.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Day of the week an alarm is armed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
            Weekday::Saturday => "saturday",
            Weekday::Sunday => "sunday",
        }
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }
}

impl FromStr for Weekday {
    type Err = ValidationError;

    /// Accepts full names and three-letter abbreviations, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Weekday::ALL
            .into_iter()
            .find(|d| d.as_str() == lower || d.as_str()[..3] == lower)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "days".into(),
                message: format!("unknown weekday '{s}'"),
            })
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Problem difficulty shared by alarms and problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(ValidationError::InvalidValue {
                field: "difficulty".into(),
                message: format!("expected easy|medium|hard, got '{other}'"),
            }),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock time of day an alarm rings, serialized as `"HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AlarmTime {
    hour: u8,
    minute: u8,
}

impl AlarmTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ValidationError> {
        if hour > 23 || minute > 59 {
            return Err(ValidationError::InvalidTime(format!("{hour:02}:{minute:02}")));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn as_naive_time(&self) -> NaiveTime {
        // Fields are range-checked on construction.
        NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, 0).unwrap_or(NaiveTime::MIN)
    }

    /// This time of day on the given calendar date.
    pub fn on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.as_naive_time())
    }
}

impl FromStr for AlarmTime {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidTime(s.to_string());
        let (h, m) = s.split_once(':').ok_or_else(invalid)?;
        let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
        if !two_digits(h) || !two_digits(m) {
            return Err(invalid());
        }
        let hour = h.parse::<u8>().map_err(|_| invalid())?;
        let minute = m.parse::<u8>().map_err(|_| invalid())?;
        AlarmTime::new(hour, minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for AlarmTime {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AlarmTime> for String {
    fn from(time: AlarmTime) -> Self {
        time.to_string()
    }
}

impl fmt::Display for AlarmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Sound played while the alarm rings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundConfig {
    pub file: String,
    pub volume: f64,
    #[serde(rename = "loop")]
    pub looping: bool,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            file: "assets/sounds/alarm_default.wav".into(),
            volume: 0.8,
            looping: true,
        }
    }
}

/// Longest snooze an alarm may configure, in seconds.
pub const MAX_SNOOZE_SECS: u64 = 24 * 60 * 60;

/// Snooze behaviour. `duration` is in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnoozeConfig {
    pub enabled: bool,
    pub duration: u64,
    /// Snoozes allowed per activation; 0 means unlimited.
    pub max_count: u32,
}

impl Default for SnoozeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration: 300,
            max_count: 3,
        }
    }
}

/// A configured alarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: String,
    pub enabled: bool,
    pub time: AlarmTime,
    pub days: BTreeSet<Weekday>,
    pub label: String,
    pub problem_sets: Vec<String>,
    pub difficulty: Difficulty,
    pub sound: SoundConfig,
    pub snooze: SnoozeConfig,
    /// Written only by the scheduler on a successful trigger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_triggered: Option<NaiveDateTime>,
}

impl Alarm {
    /// New enabled alarm with a random id and default sound/snooze.
    pub fn new(time: AlarmTime, days: impl IntoIterator<Item = Weekday>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            enabled: true,
            time,
            days: days.into_iter().collect(),
            label: String::new(),
            problem_sets: Vec::new(),
            difficulty: Difficulty::default(),
            sound: SoundConfig::default(),
            snooze: SnoozeConfig::default(),
            last_triggered: None,
        }
    }

    /// Check invariants that the type system cannot express.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField {
                record: "alarm".into(),
                field: "id".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.sound.volume) {
            return Err(ValidationError::VolumeOutOfRange(self.sound.volume));
        }
        if self.snooze.enabled && self.snooze.duration == 0 {
            return Err(ValidationError::InvalidValue {
                field: "snooze.duration".into(),
                message: "must be positive when snooze is enabled".into(),
            });
        }
        if self.snooze.duration > MAX_SNOOZE_SECS {
            return Err(ValidationError::InvalidValue {
                field: "snooze.duration".into(),
                message: format!("must be at most {MAX_SNOOZE_SECS} seconds"),
            });
        }
        Ok(())
    }

    pub fn is_armed_on(&self, day: Weekday) -> bool {
        self.enabled && self.days.contains(&day)
    }
}
