mod handler;
mod model;
mod repository;

pub use handler::{ProblemHandler, QuizHandler};
pub use model::{Problem, ProblemKind, ProblemType, QuizContent, QuizOption, QuizQuestion};
pub use repository::{
    JsonProblemRepository, MemoryProblemRepository, ProblemRepository, SetReport, SkippedRecord,
};
