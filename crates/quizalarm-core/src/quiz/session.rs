//! Quiz session bound to one alarm activation.
//!
//! A session draws every problem of the requested sets at one difficulty,
//! shuffles them once, and walks through them. A wrong answer moves on to
//! the next problem (problems are never retried); the first correct answer
//! wins the session and leaves the index where it is.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::alarm::Difficulty;
use crate::problem::{Problem, ProblemHandler, ProblemRepository, ProblemType};

/// Counters exposed for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_attempts: u32,
    pub correct_answers: u32,
    /// 1-based position of the current problem.
    pub current_problem: usize,
    pub total_problems: usize,
    pub completion_rate: f64,
}

pub struct QuizSession {
    problem_sets: Vec<String>,
    difficulty: Difficulty,
    repository: Arc<dyn ProblemRepository>,
    problems: Vec<Problem>,
    index: usize,
    total_attempts: u32,
    correct_answers: u32,
    handler: Option<ProblemHandler>,
}

impl std::fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuizSession")
            .field("problem_sets", &self.problem_sets)
            .field("difficulty", &self.difficulty)
            .field("problems", &self.problems.len())
            .field("index", &self.index)
            .field("total_attempts", &self.total_attempts)
            .field("correct_answers", &self.correct_answers)
            .finish()
    }
}

impl QuizSession {
    pub fn new(
        problem_sets: Vec<String>,
        difficulty: Difficulty,
        repository: Arc<dyn ProblemRepository>,
    ) -> Self {
        Self {
            problem_sets,
            difficulty,
            repository,
            problems: Vec::new(),
            index: 0,
            total_attempts: 0,
            correct_answers: 0,
            handler: None,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Load, concatenate in set order, shuffle once, reset counters.
    pub fn start(&mut self) {
        self.start_with_rng(&mut rand::thread_rng());
    }

    pub fn start_with_rng<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut problems = Vec::new();
        for set in &self.problem_sets {
            let loaded = self.repository.load_by_difficulty(set, self.difficulty);
            debug!(set = %set, difficulty = %self.difficulty, count = loaded.len(), "problems loaded");
            problems.extend(loaded);
        }

        let before = problems.len();
        problems.retain(|p| p.problem_type() == ProblemType::Quiz);
        if problems.len() < before {
            warn!(skipped = before - problems.len(), "skipping problems without a handler");
        }

        problems.shuffle(rng);
        self.problems = problems;
        self.index = 0;
        self.total_attempts = 0;
        self.correct_answers = 0;
        self.rebuild_handler();
    }

    /// Check `selected` against the current problem.
    ///
    /// Exact set equality wins the session (index unchanged); anything else
    /// advances to the next problem. Returns false without counting an
    /// attempt when no problem is left.
    pub fn submit(&mut self, selected: &[String]) -> bool {
        let Some(handler) = self.handler.as_ref() else {
            return false;
        };
        self.total_attempts += 1;

        if handler.check_answer(selected) {
            self.correct_answers += 1;
            true
        } else {
            self.index += 1;
            self.rebuild_handler();
            false
        }
    }

    /// Toggle an option in the current selection. See [`QuizSession::progress`].
    pub fn toggle_option(&mut self, option_id: &str) -> bool {
        self.handler
            .as_mut()
            .map(|h| h.toggle(option_id))
            .unwrap_or(false)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn current_problem(&self) -> Option<&Problem> {
        self.problems.get(self.index)
    }

    pub fn has_more(&self) -> bool {
        self.index < self.problems.len()
    }

    /// Selected options over total options of the current problem.
    /// A display aid only.
    pub fn progress(&self) -> f64 {
        self.handler.as_ref().map(|h| h.progress()).unwrap_or(0.0)
    }

    pub fn is_complete(&self) -> bool {
        self.correct_answers > 0
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn problem_count(&self) -> usize {
        self.problems.len()
    }

    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            total_attempts: self.total_attempts,
            correct_answers: self.correct_answers,
            current_problem: self.index + 1,
            total_problems: self.problems.len(),
            completion_rate: self.correct_answers as f64 / self.total_attempts.max(1) as f64,
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn rebuild_handler(&mut self) {
        self.handler = self
            .current_problem()
            .and_then(|p| ProblemHandler::for_problem(p).ok());
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::problem::MemoryProblemRepository;
    use crate::test_support::quiz;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    proptest! {
        #[test]
        fn submit_true_iff_exact_set(
            correct in proptest::collection::btree_set(prop::sample::select(vec!["a", "b", "c", "d"]), 1..=4),
            chosen in proptest::collection::vec(prop::sample::select(vec!["a", "b", "c", "d"]), 0..6),
        ) {
            let correct: Vec<&str> = correct.into_iter().collect();
            let repo = MemoryProblemRepository::new()
                .with_set("s", vec![quiz("p", Difficulty::Easy, &correct)]);
            let mut session = QuizSession::new(vec!["s".into()], Difficulty::Easy, Arc::new(repo));
            session.start();

            let chosen_set: BTreeSet<&str> = chosen.iter().copied().collect();
            let expected = chosen_set == correct.iter().copied().collect::<BTreeSet<_>>();
            let selected: Vec<String> = chosen.iter().map(|s| s.to_string()).collect();

            prop_assert_eq!(session.submit(&selected), expected);
            prop_assert_eq!(session.index(), if expected { 0 } else { 1 });
        }
    }
}
