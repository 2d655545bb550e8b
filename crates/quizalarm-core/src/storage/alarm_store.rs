//! Alarm persistence.
//!
//! `SqliteAlarmStore` keeps one row per alarm; `MemoryAlarmStore` backs
//! tests and ephemeral runs. Both validate on the way in and on the way
//! out, so a hand-edited database cannot hand the scheduler a broken alarm.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::migrations;
use crate::alarm::{Alarm, AlarmTime, Difficulty};
use crate::error::{StorageError, ValidationError};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Persistence boundary for alarms.
pub trait AlarmStore: Send + Sync {
    /// All valid alarms. Invalid records are skipped, not returned as errors.
    fn load_all(&self) -> Result<Vec<Alarm>, StorageError>;

    /// Insert or replace by id.
    fn save(&self, alarm: &Alarm) -> Result<(), StorageError>;

    /// Returns whether a record was removed.
    fn delete(&self, id: &str) -> Result<bool, StorageError>;

    fn load(&self, id: &str) -> Result<Option<Alarm>, StorageError>;
}

/// Outcome of importing a JSON array of alarms.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub imported: Vec<String>,
    pub skipped: Vec<SkippedAlarm>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedAlarm {
    pub index: usize,
    pub id: Option<String>,
    pub reason: String,
}

/// Serialize every stored alarm as a pretty JSON array.
///
/// # Errors
/// Returns an error if the store cannot be read.
pub fn export_alarms(store: &dyn AlarmStore) -> Result<String, StorageError> {
    let alarms = store.load_all()?;
    Ok(serde_json::to_string_pretty(&alarms)?)
}

/// Save every valid alarm from a JSON array, reporting the rest.
///
/// # Errors
/// Returns an error if the input is not a JSON array or a save fails.
pub fn import_alarms(store: &dyn AlarmStore, json: &str) -> Result<ImportReport, StorageError> {
    let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let mut report = ImportReport::default();

    for (index, value) in values.into_iter().enumerate() {
        let id = value.get("id").and_then(|v| v.as_str()).map(str::to_string);
        let parsed = serde_json::from_value::<Alarm>(value)
            .map_err(|e| e.to_string())
            .and_then(|alarm| alarm.validate().map(|()| alarm).map_err(|e| e.to_string()));

        match parsed {
            Ok(alarm) => {
                store.save(&alarm)?;
                report.imported.push(alarm.id);
            }
            Err(reason) => {
                tracing::warn!(index, id = ?id, %reason, "skipping alarm on import");
                report.skipped.push(SkippedAlarm { index, id, reason });
            }
        }
    }

    Ok(report)
}

/// SQLite-backed alarm store.
pub struct SqliteAlarmStore {
    conn: Mutex<Connection>,
}

impl SqliteAlarmStore {
    /// Open the database at `path`, creating and migrating it as needed.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        migrations::migrate(&conn).map_err(|e| StorageError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Locked)
    }
}

/// Raw column values, decoded after the row borrow ends.
struct AlarmRow {
    id: String,
    enabled: bool,
    time: String,
    days: String,
    label: String,
    problem_sets: String,
    difficulty: String,
    sound: String,
    snooze: String,
    last_triggered: Option<String>,
}

impl AlarmRow {
    const COLUMNS: &'static str =
        "id, enabled, time, days, label, problem_sets, difficulty, sound, snooze, last_triggered";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            enabled: row.get(1)?,
            time: row.get(2)?,
            days: row.get(3)?,
            label: row.get(4)?,
            problem_sets: row.get(5)?,
            difficulty: row.get(6)?,
            sound: row.get(7)?,
            snooze: row.get(8)?,
            last_triggered: row.get(9)?,
        })
    }

    fn into_alarm(self) -> Result<Alarm, StorageError> {
        let id = self.id;
        let invalid = |field: &str, message: String| StorageError::Corrupt {
            id: id.clone(),
            source: ValidationError::InvalidValue {
                field: field.into(),
                message,
            },
        };

        let time: AlarmTime = self.time.parse().map_err(|source| StorageError::Corrupt {
            id: id.clone(),
            source,
        })?;
        let days = serde_json::from_str(&self.days).map_err(|e| invalid("days", e.to_string()))?;
        let problem_sets = serde_json::from_str(&self.problem_sets)
            .map_err(|e| invalid("problem_sets", e.to_string()))?;
        let difficulty: Difficulty = self
            .difficulty
            .parse()
            .map_err(|e: ValidationError| invalid("difficulty", e.to_string()))?;
        let sound = serde_json::from_str(&self.sound).map_err(|e| invalid("sound", e.to_string()))?;
        let snooze =
            serde_json::from_str(&self.snooze).map_err(|e| invalid("snooze", e.to_string()))?;
        let last_triggered = self
            .last_triggered
            .map(|s| NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT))
            .transpose()
            .map_err(|e| invalid("last_triggered", e.to_string()))?;

        let alarm = Alarm {
            id: id.clone(),
            enabled: self.enabled,
            time,
            days,
            label: self.label,
            problem_sets,
            difficulty,
            sound,
            snooze,
            last_triggered,
        };
        alarm
            .validate()
            .map_err(|source| StorageError::Corrupt { id, source })?;
        Ok(alarm)
    }
}

impl AlarmStore for SqliteAlarmStore {
    fn load_all(&self) -> Result<Vec<Alarm>, StorageError> {
        let rows = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM alarms ORDER BY time, id",
                AlarmRow::COLUMNS
            ))?;
            let rows = stmt
                .query_map([], AlarmRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let mut alarms = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_alarm() {
                Ok(alarm) => alarms.push(alarm),
                Err(e) => tracing::warn!(error = %e, "skipping invalid alarm row"),
            }
        }
        Ok(alarms)
    }

    fn save(&self, alarm: &Alarm) -> Result<(), StorageError> {
        alarm.validate().map_err(|source| StorageError::Corrupt {
            id: alarm.id.clone(),
            source,
        })?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO alarms
                (id, enabled, time, days, label, problem_sets, difficulty, sound, snooze,
                 last_triggered, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                alarm.id,
                alarm.enabled,
                alarm.time.to_string(),
                serde_json::to_string(&alarm.days)?,
                alarm.label,
                serde_json::to_string(&alarm.problem_sets)?,
                alarm.difficulty.as_str(),
                serde_json::to_string(&alarm.sound)?,
                serde_json::to_string(&alarm.snooze)?,
                alarm
                    .last_triggered
                    .map(|t| t.format(TIMESTAMP_FORMAT).to_string()),
                Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string(),
            ],
        )?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM alarms WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn load(&self, id: &str) -> Result<Option<Alarm>, StorageError> {
        let row = {
            let conn = self.conn()?;
            conn.query_row(
                &format!("SELECT {} FROM alarms WHERE id = ?1", AlarmRow::COLUMNS),
                params![id],
                AlarmRow::from_row,
            )
            .optional()?
        };
        row.map(AlarmRow::into_alarm).transpose()
    }
}

/// In-memory alarm store.
#[derive(Default)]
pub struct MemoryAlarmStore {
    alarms: Mutex<BTreeMap<String, Alarm>>,
}

impl MemoryAlarmStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `alarms`; invalid ones are dropped.
    pub fn with_alarms(alarms: impl IntoIterator<Item = Alarm>) -> Self {
        let store = Self::new();
        for alarm in alarms {
            if let Err(e) = store.save(&alarm) {
                tracing::warn!(error = %e, "dropping invalid alarm");
            }
        }
        store
    }

    fn map(&self) -> Result<MutexGuard<'_, BTreeMap<String, Alarm>>, StorageError> {
        self.alarms.lock().map_err(|_| StorageError::Locked)
    }
}

impl AlarmStore for MemoryAlarmStore {
    fn load_all(&self) -> Result<Vec<Alarm>, StorageError> {
        Ok(self.map()?.values().cloned().collect())
    }

    fn save(&self, alarm: &Alarm) -> Result<(), StorageError> {
        alarm.validate().map_err(|source| StorageError::Corrupt {
            id: alarm.id.clone(),
            source,
        })?;
        self.map()?.insert(alarm.id.clone(), alarm.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.map()?.remove(id).is_some())
    }

    fn load(&self, id: &str) -> Result<Option<Alarm>, StorageError> {
        Ok(self.map()?.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::Weekday;
    use chrono::NaiveDate;

    fn sample(id: &str) -> Alarm {
        let mut alarm = Alarm::new(AlarmTime::new(7, 0).unwrap(), [Weekday::Monday, Weekday::Friday]);
        alarm.id = id.into();
        alarm.label = "Morning".into();
        alarm.problem_sets = vec!["math".into()];
        alarm
    }

    #[test]
    fn sqlite_save_load_roundtrip() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        let mut alarm = sample("a1");
        alarm.last_triggered = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(7, 0, 10);
        store.save(&alarm).unwrap();

        assert_eq!(store.load("a1").unwrap(), Some(alarm.clone()));
        assert_eq!(store.load_all().unwrap(), vec![alarm]);
        assert_eq!(store.load("missing").unwrap(), None);
    }

    #[test]
    fn sqlite_save_replaces_by_id() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        let mut alarm = sample("a1");
        store.save(&alarm).unwrap();
        alarm.enabled = false;
        store.save(&alarm).unwrap();

        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].enabled);
    }

    #[test]
    fn sqlite_delete() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        store.save(&sample("a1")).unwrap();
        assert!(store.delete("a1").unwrap());
        assert!(!store.delete("a1").unwrap());
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn sqlite_skips_corrupt_rows() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        store.save(&sample("good")).unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO alarms (id, time, sound, snooze) VALUES ('bad', '25:99', '{}', '{}')",
                [],
            )
            .unwrap();

        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "good");
        assert!(matches!(store.load("bad"), Err(StorageError::Corrupt { .. })));
    }

    #[test]
    fn save_rejects_invalid_volume() {
        let mut alarm = sample("a1");
        alarm.sound.volume = 1.5;
        let sqlite = SqliteAlarmStore::open_in_memory().unwrap();
        let memory = MemoryAlarmStore::new();
        assert!(matches!(sqlite.save(&alarm), Err(StorageError::Corrupt { .. })));
        assert!(matches!(memory.save(&alarm), Err(StorageError::Corrupt { .. })));
    }

    #[test]
    fn sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alarms.db");
        SqliteAlarmStore::open(&path).unwrap().save(&sample("a1")).unwrap();

        let reopened = SqliteAlarmStore::open(&path).unwrap();
        assert_eq!(reopened.load_all().unwrap().len(), 1);
    }

    #[test]
    fn import_reports_skipped_records() {
        let store = MemoryAlarmStore::new();
        let good = serde_json::to_value(sample("a1")).unwrap();
        let mut bad = good.clone();
        bad["id"] = "a2".into();
        bad["time"] = "7am".into();
        let json = serde_json::to_string(&vec![good, bad]).unwrap();

        let report = import_alarms(&store, &json).unwrap();
        assert_eq!(report.imported, vec!["a1"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 1);
        assert_eq!(report.skipped[0].id.as_deref(), Some("a2"));
    }

    #[test]
    fn export_then_import_into_empty_store() {
        let source = MemoryAlarmStore::with_alarms([sample("a1"), sample("a2")]);
        let json = export_alarms(&source).unwrap();

        let target = SqliteAlarmStore::open_in_memory().unwrap();
        let report = import_alarms(&target, &json).unwrap();
        assert_eq!(report.imported.len(), 2);
        assert_eq!(target.load_all().unwrap(), source.load_all().unwrap());
    }
}
