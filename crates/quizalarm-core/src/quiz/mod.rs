mod session;

pub use session::{QuizSession, SessionStats};
