//! Lesson cache commands.

use crate::db::LessonRepository;
use crate::state::AppState;
use edurural_core::types::Lesson;

use super::CommandError;

/// Store or refresh a lesson for offline use.
pub fn cache_lesson(lesson: Lesson, state: &AppState) -> Result<(), CommandError> {
    let repo = state.repo()?;
    repo.put_lesson(&lesson).map_err(Into::into)
}

pub fn get_lesson(id: &str, state: &AppState) -> Result<Option<Lesson>, CommandError> {
    let repo = state.repo()?;
    repo.get_lesson(id).map_err(Into::into)
}

/// All cached lessons, grouped by subject.
pub fn list_lessons(state: &AppState) -> Result<Vec<Lesson>, CommandError> {
    let repo = state.repo()?;
    repo.get_all_lessons().map_err(Into::into)
}

pub fn list_lessons_by_subject(
    subject: &str,
    state: &AppState,
) -> Result<Vec<Lesson>, CommandError> {
    let repo = state.repo()?;
    repo.get_lessons_by_subject(subject).map_err(Into::into)
}
