//! Teacher dashboard commands.

use crate::state::AppState;
use edurural_core::types::StudentSummary;

use super::CommandError;

/// Class roster with per-subject scores. Needs the backend.
pub async fn get_students(state: &AppState) -> Result<Vec<StudentSummary>, CommandError> {
    if !state.connectivity.is_online() {
        return Err(CommandError::new("Student list is unavailable offline"));
    }
    state.remote.get_students().await.map_err(Into::into)
}
