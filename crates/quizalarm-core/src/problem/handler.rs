//! Answer checking, dispatched over problem type.
//!
//! Every variant honours the same two-operation contract:
//! `check_answer(input) -> bool` and `progress() -> 0.0..=1.0`.

use std::collections::BTreeSet;

use super::model::{Problem, ProblemKind, QuizContent};
use crate::error::ValidationError;

/// Multi-select, exact-match quiz handler.
#[derive(Debug, Clone)]
pub struct QuizHandler {
    content: QuizContent,
    selected: BTreeSet<String>,
}

impl QuizHandler {
    pub fn new(content: QuizContent) -> Self {
        Self {
            content,
            selected: BTreeSet::new(),
        }
    }

    /// Flip one option in the current selection. Unknown ids are ignored.
    /// Returns whether the option is selected afterwards.
    pub fn toggle(&mut self, option_id: &str) -> bool {
        if !self.content.has_option(option_id) {
            return false;
        }
        if !self.selected.remove(option_id) {
            self.selected.insert(option_id.to_string());
            return true;
        }
        false
    }

    pub fn selected(&self) -> &BTreeSet<String> {
        &self.selected
    }

    /// True iff `selected` equals the correct-answer set. Order and
    /// duplicates are irrelevant; no partial credit.
    pub fn check_answer(&self, selected: &[String]) -> bool {
        let chosen: BTreeSet<&str> = selected.iter().map(String::as_str).collect();
        chosen == self.content.correct_set()
    }

    pub fn progress(&self) -> f64 {
        let total = self.content.options.len();
        if total == 0 {
            return 0.0;
        }
        (self.selected.len() as f64 / total as f64).min(1.0)
    }
}

/// Handler for the current problem, one variant per supported type.
#[derive(Debug, Clone)]
pub enum ProblemHandler {
    Quiz(QuizHandler),
}

impl ProblemHandler {
    pub fn for_problem(problem: &Problem) -> Result<Self, ValidationError> {
        match &problem.kind {
            ProblemKind::Quiz(content) => Ok(ProblemHandler::Quiz(QuizHandler::new(content.clone()))),
            ProblemKind::Game(_) => Err(ValidationError::UnsupportedProblemType(
                problem.problem_type().as_str().to_string(),
            )),
        }
    }

    pub fn check_answer(&self, input: &[String]) -> bool {
        match self {
            ProblemHandler::Quiz(quiz) => quiz.check_answer(input),
        }
    }

    pub fn progress(&self) -> f64 {
        match self {
            ProblemHandler::Quiz(quiz) => quiz.progress(),
        }
    }

    pub fn toggle(&mut self, option_id: &str) -> bool {
        match self {
            ProblemHandler::Quiz(quiz) => quiz.toggle(option_id),
        }
    }
}
