//! Core library shared by the offline client and the shell proxy.
//!
//! Provides:
//! - Entity types (Lesson, Quiz, QuizResult, StudentProgress, SyncQueueEntry)
//! - Quiz grading and feedback tiers
//! - Shape validation for queued records
//! - The `SyncIntent` message passed from the shell to the sync engine

pub mod error;
pub mod scoring;
pub mod types;

pub use error::{Result, ValidationError};
pub use scoring::{earns_badge, grade, score_percentage, Feedback, Grade};
pub use types::{
    Lesson, QueueEntryKind, Question, Quiz, QuizResult, StudentProgress,
    StudentSummary, SyncIntent, SyncQueueEntry, User, UserRole, BACKGROUND_SYNC_TAG, UNANSWERED,
};
