//! Commands exposed to the UI layer.
//!
//! Each command takes its arguments followed by `&AppState` and returns
//! `Result<T, CommandError>`.

pub mod auth;
pub mod lessons;
pub mod progress;
pub mod quiz;
pub mod settings;
pub mod storage;
pub mod sync;
pub mod teacher;

pub use auth::{current_user, login, logout, signup};
pub use lessons::{cache_lesson, get_lesson, list_lessons, list_lessons_by_subject};
pub use progress::{get_student_progress, save_student_progress};
pub use quiz::{cache_quiz, get_quiz_for_lesson, submit_quiz, SubmitQuizRequest, SubmitQuizResponse};
pub use settings::{get_language, get_setting, save_setting, set_language};
pub use storage::{clear_all, get_storage_mode};
pub use sync::{get_sync_status, manual_sync, set_connectivity, ManualSyncResponse, SyncStatusResponse};
pub use teacher::get_students;

use crate::db::DbError;
use crate::remote::RemoteError;
use edurural_core::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CommandError {
    pub message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<DbError> for CommandError {
    fn from(e: DbError) -> Self {
        Self {
            message: format!("Database error: {}", e),
        }
    }
}

impl From<ValidationError> for CommandError {
    fn from(e: ValidationError) -> Self {
        Self {
            message: format!("Invalid submission: {}", e),
        }
    }
}

impl From<RemoteError> for CommandError {
    fn from(e: RemoteError) -> Self {
        Self { message: e.to_string() }
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(e: serde_json::Error) -> Self {
        Self { message: e.to_string() }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use tokio::sync::mpsc;

    use crate::connectivity::ConnectivityMonitor;
    use crate::db::{SqliteRepository, StorageMode};
    use crate::remote::fake::FakeRemote;
    use crate::state::AppState;
    use crate::sync::SyncOptions;
    use edurural_core::types::SyncIntent;

    pub struct Harness {
        pub state: AppState,
        pub intents: mpsc::Receiver<SyncIntent>,
        pub remote: Arc<FakeRemote>,
    }

    pub fn harness(online: bool) -> Harness {
        harness_with(online, FakeRemote::new())
    }

    pub fn harness_with(online: bool, remote: FakeRemote) -> Harness {
        let remote = Arc::new(remote);
        let (state, intents) = AppState::new(
            SqliteRepository::open_in_memory().unwrap(),
            StorageMode::InMemory {
                reason: "test".into(),
            },
            remote.clone(),
            ConnectivityMonitor::new(online),
            SyncOptions::default(),
        );
        Harness {
            state,
            intents,
            remote,
        }
    }
}
