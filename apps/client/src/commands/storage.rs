//! Local store maintenance commands.

use crate::db::StorageMode;
use crate::state::AppState;

use super::CommandError;

/// Whether the store is durable or fell back to memory at startup.
pub fn get_storage_mode(state: &AppState) -> StorageMode {
    state.storage_mode.clone()
}

/// Wipe lessons, quizzes, results, progress, and the sync queue.
/// Settings are kept.
pub fn clear_all(state: &AppState) -> Result<(), CommandError> {
    let repo = state.repo()?;
    repo.clear_all()?;
    tracing::warn!("local data cleared");
    Ok(())
}
