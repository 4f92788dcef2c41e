//! Error types for edurural-core.

use thiserror::Error;

/// Result type alias using ValidationError.
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Errors raised when a record or submission has the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("score out of range: {0}")]
    ScoreOutOfRange(u8),

    #[error("expected {expected} answers, got {actual}")]
    AnswerCount { expected: usize, actual: usize },

    #[error("answer {value} out of range for question {question}")]
    AnswerOutOfRange { question: usize, value: i32 },

    #[error("quiz has no questions")]
    EmptyQuiz,
}
