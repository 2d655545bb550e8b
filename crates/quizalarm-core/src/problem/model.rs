//! Problem records and quiz content.
//!
//! Problems arrive as loosely-typed JSON. Conversion goes through the raw
//! `Raw*` mirrors so that every structural rule is checked in one place and
//! reported as a [`ValidationError`] instead of an opaque serde message.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::alarm::Difficulty;
use crate::error::ValidationError;

/// Problem type tag as it appears in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProblemType {
    Quiz,
    Game,
}

impl ProblemType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProblemType::Quiz => "quiz",
            ProblemType::Game => "game",
        }
    }

    fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "quiz" => Ok(ProblemType::Quiz),
            "game" => Ok(ProblemType::Game),
            other => Err(ValidationError::UnsupportedProblemType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOption {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

/// Multi-select quiz: exactly the `correct_answers` set must be chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizContent {
    pub question: QuizQuestion,
    pub options: Vec<QuizOption>,
    pub correct_answers: Vec<String>,
}

impl QuizContent {
    pub fn correct_set(&self) -> BTreeSet<&str> {
        self.correct_answers.iter().map(String::as_str).collect()
    }

    pub fn has_option(&self, id: &str) -> bool {
        self.options.iter().any(|o| o.id == id)
    }
}

/// Type-specific body of a problem.
#[derive(Debug, Clone, PartialEq)]
pub enum ProblemKind {
    Quiz(QuizContent),
    /// Game content is carried opaquely; no handler exists for it yet.
    Game(serde_json::Value),
}

/// A single challenge presented while an alarm rings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawProblem", into = "RawProblem")]
pub struct Problem {
    pub id: String,
    pub category: String,
    pub title: String,
    pub difficulty: Difficulty,
    pub kind: ProblemKind,
}

impl Problem {
    pub fn problem_type(&self) -> ProblemType {
        match self.kind {
            ProblemKind::Quiz(_) => ProblemType::Quiz,
            ProblemKind::Game(_) => ProblemType::Game,
        }
    }

    pub fn as_quiz(&self) -> Option<&QuizContent> {
        match &self.kind {
            ProblemKind::Quiz(quiz) => Some(quiz),
            ProblemKind::Game(_) => None,
        }
    }

    /// Validate and convert one JSON record.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ValidationError> {
        let raw: RawProblem =
            serde_json::from_value(value).map_err(|e| ValidationError::InvalidValue {
                field: "problem".into(),
                message: e.to_string(),
            })?;
        Problem::try_from(raw)
    }
}

// ── Raw mirrors ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawProblem {
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    category: Option<String>,
    title: Option<String>,
    difficulty: Option<Difficulty>,
    content: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawQuizContent {
    question: Option<RawQuestion>,
    options: Option<Vec<RawOption>>,
    correct_answers: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<String>,
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOption {
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    content: Option<String>,
}

fn required<T>(value: Option<T>, record: &str, field: &str) -> Result<T, ValidationError> {
    value.ok_or_else(|| ValidationError::MissingField {
        record: record.to_string(),
        field: field.to_string(),
    })
}

impl TryFrom<RawProblem> for Problem {
    type Error = ValidationError;

    fn try_from(raw: RawProblem) -> Result<Self, Self::Error> {
        let id = required(raw.id, "problem", "id")?;
        let kind = required(raw.kind, &id, "type")?;
        let category = required(raw.category, &id, "category")?;
        let title = required(raw.title, &id, "title")?;
        let difficulty = required(raw.difficulty, &id, "difficulty")?;
        let content = required(raw.content, &id, "content")?;

        let kind = match ProblemType::parse(&kind)? {
            ProblemType::Quiz => ProblemKind::Quiz(parse_quiz(&id, content)?),
            ProblemType::Game => ProblemKind::Game(content),
        };

        Ok(Problem {
            id,
            category,
            title,
            difficulty,
            kind,
        })
    }
}

fn parse_quiz(id: &str, content: serde_json::Value) -> Result<QuizContent, ValidationError> {
    let raw: RawQuizContent =
        serde_json::from_value(content).map_err(|e| ValidationError::InvalidValue {
            field: format!("{id}.content"),
            message: e.to_string(),
        })?;

    let question = required(raw.question, id, "content.question")?;
    let question = QuizQuestion {
        kind: question.kind.unwrap_or_else(|| "text".into()),
        text: required(question.text, id, "content.question.text")?,
        image: question.image,
    };

    let raw_options = required(raw.options, id, "content.options")?;
    if raw_options.is_empty() {
        return Err(ValidationError::EmptyOptions(id.to_string()));
    }
    let mut options = Vec::with_capacity(raw_options.len());
    for option in raw_options {
        let missing = |field: &str| ValidationError::OptionMissingField {
            problem: id.to_string(),
            field: field.to_string(),
        };
        options.push(QuizOption {
            id: option.id.ok_or_else(|| missing("id"))?,
            kind: option.kind.unwrap_or_else(|| "text".into()),
            content: option.content.ok_or_else(|| missing("content"))?,
        });
    }

    let correct_answers = required(raw.correct_answers, id, "content.correct_answers")?;
    if correct_answers.is_empty() {
        return Err(ValidationError::EmptyCorrectAnswers(id.to_string()));
    }
    if let Some(unknown) = correct_answers
        .iter()
        .find(|answer| !options.iter().any(|o| &o.id == *answer))
    {
        return Err(ValidationError::UnknownCorrectAnswer {
            problem: id.to_string(),
            option: unknown.clone(),
        });
    }

    Ok(QuizContent {
        question,
        options,
        correct_answers,
    })
}

impl From<Problem> for RawProblem {
    fn from(problem: Problem) -> Self {
        let kind = problem.problem_type().as_str().to_string();
        let content = match problem.kind {
            ProblemKind::Quiz(quiz) => serde_json::to_value(quiz).unwrap_or_default(),
            ProblemKind::Game(value) => value,
        };
        RawProblem {
            id: Some(problem.id),
            kind: Some(kind),
            category: Some(problem.category),
            title: Some(problem.title),
            difficulty: Some(problem.difficulty),
            content: Some(content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quiz_json() -> serde_json::Value {
        json!({
            "id": "m1",
            "type": "quiz",
            "category": "math",
            "title": "Primes",
            "difficulty": "easy",
            "content": {
                "question": {"type": "text", "text": "Which are prime?"},
                "options": [
                    {"id": "a", "type": "text", "content": "2"},
                    {"id": "b", "type": "text", "content": "4"},
                    {"id": "c", "type": "text", "content": "5"}
                ],
                "correct_answers": ["a", "c"]
            }
        })
    }

    #[test]
    fn parses_valid_quiz() {
        let problem = Problem::from_value(quiz_json()).unwrap();
        assert_eq!(problem.problem_type(), ProblemType::Quiz);
        let quiz = problem.as_quiz().unwrap();
        assert_eq!(quiz.options.len(), 3);
        assert_eq!(quiz.correct_set(), BTreeSet::from(["a", "c"]));
    }

    #[test]
    fn missing_field_is_reported() {
        let mut value = quiz_json();
        value.as_object_mut().unwrap().remove("title");
        assert_eq!(
            Problem::from_value(value),
            Err(ValidationError::MissingField {
                record: "m1".into(),
                field: "title".into()
            })
        );
    }

    #[test]
    fn empty_options_rejected() {
        let mut value = quiz_json();
        value["content"]["options"] = json!([]);
        assert_eq!(
            Problem::from_value(value),
            Err(ValidationError::EmptyOptions("m1".into()))
        );
    }

    #[test]
    fn option_without_content_rejected() {
        let mut value = quiz_json();
        value["content"]["options"][1] = json!({"id": "b"});
        assert!(matches!(
            Problem::from_value(value),
            Err(ValidationError::OptionMissingField { .. })
        ));
    }

    #[test]
    fn correct_answers_must_reference_options() {
        let mut value = quiz_json();
        value["content"]["correct_answers"] = json!(["a", "z"]);
        assert_eq!(
            Problem::from_value(value),
            Err(ValidationError::UnknownCorrectAnswer {
                problem: "m1".into(),
                option: "z".into()
            })
        );

        let mut value = quiz_json();
        value["content"]["correct_answers"] = json!([]);
        assert_eq!(
            Problem::from_value(value),
            Err(ValidationError::EmptyCorrectAnswers("m1".into()))
        );
    }

    #[test]
    fn unknown_type_rejected_and_game_kept_opaque() {
        let mut value = quiz_json();
        value["type"] = json!("riddle");
        assert!(matches!(
            Problem::from_value(value),
            Err(ValidationError::UnsupportedProblemType(_))
        ));

        let mut value = quiz_json();
        value["type"] = json!("game");
        value["content"] = json!({"board": [1, 2, 3]});
        let problem = Problem::from_value(value).unwrap();
        assert_eq!(problem.problem_type(), ProblemType::Game);
        assert!(problem.as_quiz().is_none());
    }

    #[test]
    fn serializes_back_to_field_contract() {
        let problem = Problem::from_value(quiz_json()).unwrap();
        let value = serde_json::to_value(&problem).unwrap();
        assert_eq!(value["type"], "quiz");
        assert_eq!(value["content"]["correct_answers"], json!(["a", "c"]));
        assert!(value["content"]["question"].get("image").is_none());
    }
}
