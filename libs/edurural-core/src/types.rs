//! Core types shared by the client and the shell proxy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Sentinel stored in `QuizResult::answers` for a question left blank.
pub const UNANSWERED: i32 = -1;

/// Tag used when the shell registers a deferred background sync.
pub const BACKGROUND_SYNC_TAG: &str = "sync-queue";

/// A cached lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub subject: String,
    pub title: String,
    pub content: String,
    /// Display order within the subject.
    #[serde(default)]
    pub position: u32,
}

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

/// A cached quiz. Many quizzes may point at one lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub lesson_id: String,
    #[serde(default)]
    pub title: String,
    pub questions: Vec<Question>,
}

/// Outcome of one quiz submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    pub id: String,
    pub student_id: String,
    pub lesson_id: String,
    /// Percentage score, 0-100.
    pub score: u8,
    /// Selected option per question, `UNANSWERED` for blanks.
    pub answers: Vec<i32>,
    pub completed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_taken_minutes: Option<u32>,
    pub synced: bool,
}

impl QuizResult {
    /// Build a fresh, unsynced result.
    pub fn new(
        student_id: &str,
        lesson_id: &str,
        score: u8,
        answers: Vec<i32>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Self::result_id(student_id, lesson_id, completed_at),
            student_id: student_id.to_string(),
            lesson_id: lesson_id.to_string(),
            score,
            answers,
            completed_at,
            time_taken_minutes: None,
            synced: false,
        }
    }

    /// Primary key for a result: student, lesson and completion millisecond,
    /// plus a random suffix so submissions in the same millisecond stay apart.
    pub fn result_id(student_id: &str, lesson_id: &str, completed_at: DateTime<Utc>) -> String {
        format!(
            "{}_{}_{}_{}",
            student_id,
            lesson_id,
            completed_at.timestamp_millis(),
            Uuid::new_v4().simple()
        )
    }

    /// Basic shape check applied to rows read back from the queue.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("id"));
        }
        if self.student_id.trim().is_empty() {
            return Err(ValidationError::MissingField("student_id"));
        }
        if self.lesson_id.trim().is_empty() {
            return Err(ValidationError::MissingField("lesson_id"));
        }
        if self.score > 100 {
            return Err(ValidationError::ScoreOutOfRange(self.score));
        }
        if let Some((question, value)) = self
            .answers
            .iter()
            .enumerate()
            .find(|(_, a)| **a < UNANSWERED)
        {
            return Err(ValidationError::AnswerOutOfRange {
                question,
                value: *value,
            });
        }
        Ok(())
    }
}

/// Per-student aggregate. One row per student, overwritten on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProgress {
    pub student_id: String,
    pub completed_lessons: u32,
    /// Average score across all stored results.
    pub total_score: f64,
    pub badges_earned: u32,
    pub last_updated: DateTime<Utc>,
}

impl StudentProgress {
    /// Recompute the aggregate from every result the student has on device.
    pub fn from_results(student_id: &str, results: &[QuizResult], now: DateTime<Utc>) -> Self {
        let mut lessons: Vec<&str> = results.iter().map(|r| r.lesson_id.as_str()).collect();
        lessons.sort_unstable();
        lessons.dedup();

        let total_score = if results.is_empty() {
            0.0
        } else {
            let sum: u32 = results.iter().map(|r| u32::from(r.score)).sum();
            f64::from(sum) / results.len() as f64
        };

        let badges = results
            .iter()
            .filter(|r| crate::scoring::earns_badge(r.score))
            .count();

        Self {
            student_id: student_id.to_string(),
            completed_lessons: lessons.len() as u32,
            total_score,
            badges_earned: badges as u32,
            last_updated: now,
        }
    }
}

/// What a queued mutation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEntryKind {
    QuizResult,
}

impl QueueEntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::QuizResult => "quiz_result",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "quiz_result" => Some(Self::QuizResult),
            _ => None,
        }
    }
}

/// A mutation waiting for remote acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueEntry {
    pub id: i64,
    pub kind: QueueEntryKind,
    /// Primary key of the referenced entity.
    pub ref_id: String,
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
    pub retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub dead_lettered: bool,
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Student,
    Teacher,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Student
    }
}

/// Signed-in account as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

/// Row on the teacher dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub enrollment_id: String,
    pub math_score: u8,
    pub science_score: u8,
    pub quizzes_completed: u32,
    pub last_active: DateTime<Utc>,
}

/// Message from the shell proxy asking for a sync once the network is back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncIntent {
    pub tag: String,
    pub registered_at: DateTime<Utc>,
}

impl SyncIntent {
    pub fn background() -> Self {
        Self {
            tag: BACKGROUND_SYNC_TAG.to_string(),
            registered_at: Utc::now(),
        }
    }
}
