//! Quiz commands: caching, lookup, and submission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{ProgressRepository, QuizRepository, ResultRepository};
use crate::state::AppState;
use edurural_core::scoring::{earns_badge, grade, Feedback};
use edurural_core::types::{Quiz, QuizResult, StudentProgress, SyncIntent};
use edurural_core::ValidationError;

use super::CommandError;

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitQuizRequest {
    pub student_id: String,
    pub lesson_id: String,
    /// One entry per question; `-1` for a blank.
    pub answers: Vec<i32>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitQuizResponse {
    pub score: u8,
    pub correct: usize,
    pub total: usize,
    pub feedback: Feedback,
    pub badge_earned: bool,
    pub result: QuizResult,
    pub progress: StudentProgress,
}

pub fn cache_quiz(quiz: Quiz, state: &AppState) -> Result<(), CommandError> {
    let repo = state.repo()?;
    repo.put_quiz(&quiz).map_err(Into::into)
}

/// First cached quiz for a lesson.
pub fn get_quiz_for_lesson(
    lesson_id: &str,
    state: &AppState,
) -> Result<Option<Quiz>, CommandError> {
    let repo = state.repo()?;
    Ok(repo.get_quizzes_by_lesson(lesson_id)?.into_iter().next())
}

/// Grade and store a submission, queue it for sync, and refresh progress.
///
/// Works the same offline; the result waits in the queue until a sync
/// cycle delivers it.
pub fn submit_quiz(
    request: SubmitQuizRequest,
    state: &AppState,
) -> Result<SubmitQuizResponse, CommandError> {
    if request.student_id.trim().is_empty() {
        return Err(ValidationError::MissingField("student_id").into());
    }

    let now = Utc::now();
    let response = {
        let repo = state.repo()?;

        let quiz = repo
            .get_quizzes_by_lesson(&request.lesson_id)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                CommandError::new(format!("No quiz available for lesson {}", request.lesson_id))
            })?;
        let graded = grade(&quiz, &request.answers)?;

        let mut result = QuizResult::new(
            &request.student_id,
            &request.lesson_id,
            graded.score,
            request.answers,
            now,
        );
        result.time_taken_minutes = request.started_at.map(|started| minutes_between(started, now));
        repo.record_submission(&result)?;

        let history = repo.get_results_by_student(&request.student_id)?;
        let progress = StudentProgress::from_results(&request.student_id, &history, now);
        repo.put_progress(&progress)?;

        tracing::info!(
            result_id = %result.id,
            score = graded.score,
            "quiz submitted"
        );

        SubmitQuizResponse {
            score: graded.score,
            correct: graded.correct,
            total: graded.total,
            feedback: Feedback::from_score(graded.score),
            badge_earned: earns_badge(graded.score),
            result,
            progress,
        }
    };

    if state.connectivity.is_online() {
        if let Err(e) = state.intents.try_send(SyncIntent::background()) {
            tracing::debug!(error = %e, "sync intent not delivered, periodic sync will pick it up");
        }
    }

    Ok(response)
}

/// Whole minutes, rounded to nearest.
fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
    let ms = (end - start).num_milliseconds().max(0);
    ((ms + 30_000) / 60_000) as u32
}
