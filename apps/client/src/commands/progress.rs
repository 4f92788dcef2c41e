//! Student progress commands.

use crate::db::ProgressRepository;
use crate::state::AppState;
use edurural_core::types::StudentProgress;

use super::CommandError;

pub fn get_student_progress(
    student_id: &str,
    state: &AppState,
) -> Result<Option<StudentProgress>, CommandError> {
    let repo = state.repo()?;
    repo.get_progress(student_id).map_err(Into::into)
}

/// Overwrite the student's progress row. Last write wins.
pub fn save_student_progress(
    progress: StudentProgress,
    state: &AppState,
) -> Result<(), CommandError> {
    let repo = state.repo()?;
    repo.put_progress(&progress).map_err(Into::into)
}
