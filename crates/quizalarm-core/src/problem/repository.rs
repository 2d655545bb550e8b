//! Problem set loading.
//!
//! Sets live at `<root>/quiz/<set>.json`, each a JSON array of problem
//! records. Invalid records are skipped with a warning; they never abort
//! the load of the remaining records.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, warn};

use super::model::Problem;
use crate::alarm::Difficulty;
use crate::error::{CoreError, ValidationError};

/// Source of validated problems for a quiz session.
pub trait ProblemRepository: Send + Sync {
    /// Problems of `set_name` at `difficulty`, in file order.
    fn load_by_difficulty(&self, set_name: &str, difficulty: Difficulty) -> Vec<Problem>;
}

/// A record that failed validation while loading a set.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRecord {
    pub index: usize,
    pub id: Option<String>,
    pub reason: String,
}

/// Outcome of loading a single set file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SetReport {
    pub set_name: String,
    pub problems: Vec<Problem>,
    pub skipped: Vec<SkippedRecord>,
}

/// Problem sets read from JSON files under a root directory.
pub struct JsonProblemRepository {
    root: PathBuf,
    cache: Mutex<HashMap<String, Arc<Vec<Problem>>>>,
}

impl JsonProblemRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn quiz_dir(&self) -> PathBuf {
        self.root.join("quiz")
    }

    pub fn set_path(&self, set_name: &str) -> PathBuf {
        self.quiz_dir().join(format!("{set_name}.json"))
    }

    /// Names of all set files, sorted.
    pub fn available_sets(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.quiz_dir()) else {
            return Vec::new();
        };
        let mut sets: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        sets.sort();
        sets
    }

    /// Read and validate one set without touching the cache.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a JSON array.
    pub fn load_set(&self, set_name: &str) -> Result<SetReport, CoreError> {
        let content = std::fs::read_to_string(self.set_path(set_name))?;
        let records: Vec<serde_json::Value> = serde_json::from_str(&content)?;

        let mut report = SetReport {
            set_name: set_name.to_string(),
            ..SetReport::default()
        };
        for (index, record) in records.into_iter().enumerate() {
            let id = record.get("id").and_then(|v| v.as_str()).map(str::to_string);
            match Problem::from_value(record) {
                Ok(problem) => report.problems.push(problem),
                Err(e) => report.skipped.push(skipped(index, id, &e)),
            }
        }
        Ok(report)
    }

    /// All valid problems of a set, cached after the first successful read.
    /// Unreadable sets yield an empty list.
    pub fn load_problem_set(&self, set_name: &str) -> Arc<Vec<Problem>> {
        if let Some(cached) = self.lock_cache().get(set_name) {
            return Arc::clone(cached);
        }

        match self.load_set(set_name) {
            Ok(report) => {
                for record in &report.skipped {
                    warn!(
                        set = set_name,
                        index = record.index,
                        id = record.id.as_deref().unwrap_or("?"),
                        reason = %record.reason,
                        "skipping invalid problem record"
                    );
                }
                debug!(set = set_name, count = report.problems.len(), "problem set loaded");
                let problems = Arc::new(report.problems);
                self.lock_cache()
                    .insert(set_name.to_string(), Arc::clone(&problems));
                problems
            }
            Err(e) => {
                warn!(set = set_name, error = %e, "failed to load problem set");
                Arc::new(Vec::new())
            }
        }
    }

    /// Drop cached sets so the next load re-reads the files.
    pub fn reload(&self) {
        self.lock_cache().clear();
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Vec<Problem>>>> {
        // A poisoned cache only ever holds fully-inserted entries.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn skipped(index: usize, id: Option<String>, error: &ValidationError) -> SkippedRecord {
    SkippedRecord {
        index,
        id,
        reason: error.to_string(),
    }
}

impl ProblemRepository for JsonProblemRepository {
    fn load_by_difficulty(&self, set_name: &str, difficulty: Difficulty) -> Vec<Problem> {
        self.load_problem_set(set_name)
            .iter()
            .filter(|p| p.difficulty == difficulty)
            .cloned()
            .collect()
    }
}

/// In-memory repository, keyed by set name.
#[derive(Debug, Clone, Default)]
pub struct MemoryProblemRepository {
    sets: HashMap<String, Vec<Problem>>,
}

impl MemoryProblemRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_set(mut self, set_name: &str, problems: Vec<Problem>) -> Self {
        self.sets.insert(set_name.to_string(), problems);
        self
    }
}

impl ProblemRepository for MemoryProblemRepository {
    fn load_by_difficulty(&self, set_name: &str, difficulty: Difficulty) -> Vec<Problem> {
        self.sets
            .get(set_name)
            .map(|problems| {
                problems
                    .iter()
                    .filter(|p| p.difficulty == difficulty)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}
