//! Shared fixtures for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::alarm::{Difficulty, SoundConfig};
use crate::audio::AudioGateway;
use crate::error::AudioError;
use crate::problem::{Problem, ProblemKind, QuizContent, QuizOption, QuizQuestion};

/// Four-option quiz (`a`..`d`) with the given correct answers.
pub(crate) fn quiz(id: &str, difficulty: Difficulty, correct: &[&str]) -> Problem {
    Problem {
        id: id.into(),
        category: "test".into(),
        title: id.into(),
        difficulty,
        kind: ProblemKind::Quiz(QuizContent {
            question: QuizQuestion {
                kind: "text".into(),
                text: format!("question {id}"),
                image: None,
            },
            options: ["a", "b", "c", "d"]
                .iter()
                .map(|o| QuizOption {
                    id: o.to_string(),
                    kind: "text".into(),
                    content: o.to_string(),
                })
                .collect(),
            correct_answers: correct.iter().map(|s| s.to_string()).collect(),
        }),
    }
}

/// Audio gateway that counts requests.
#[derive(Default)]
pub(crate) struct RecordingAudio {
    plays: AtomicUsize,
    stops: AtomicUsize,
    fail: bool,
}

impl RecordingAudio {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

fn unplugged() -> AudioError {
    AudioError::Spawn(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "speaker unplugged",
    ))
}

impl AudioGateway for RecordingAudio {
    fn play(&self, _sound: &SoundConfig) -> Result<(), AudioError> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(unplugged());
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), AudioError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(unplugged());
        }
        Ok(())
    }
}
