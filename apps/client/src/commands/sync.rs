//! Sync-related commands.

use serde::Serialize;

use crate::db::ResultRepository;
use crate::state::AppState;
use crate::sync::{SkipReason, SyncOutcome, SyncReport, SyncTrigger};

use super::CommandError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ManualSyncResponse {
    Completed { report: SyncReport },
    Skipped { reason: SkipReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatusResponse {
    pub is_syncing: bool,
    pub is_online: bool,
    pub pending_count: usize,
    /// True when the store fell back to memory at startup.
    pub storage_degraded: bool,
}

/// Run a sync cycle now.
pub async fn manual_sync(state: &AppState) -> Result<ManualSyncResponse, CommandError> {
    match state.sync.sync_now(SyncTrigger::Manual).await {
        SyncOutcome::Completed(report) => Ok(ManualSyncResponse::Completed { report }),
        SyncOutcome::Skipped(reason) => Ok(ManualSyncResponse::Skipped { reason }),
        SyncOutcome::Aborted(e) => Err(CommandError::new(e.to_string())),
    }
}

pub fn get_sync_status(state: &AppState) -> Result<SyncStatusResponse, CommandError> {
    let pending_count = state.repo()?.count_unsynced_results()?;
    Ok(SyncStatusResponse {
        is_syncing: state.sync.is_syncing(),
        is_online: state.connectivity.is_online(),
        pending_count,
        storage_degraded: state.storage_mode.is_degraded(),
    })
}

/// Feed the platform's online/offline signal. Returns true if it changed.
pub fn set_connectivity(online: bool, state: &AppState) -> bool {
    state.connectivity.set_online(online)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::harness;
    use chrono::Utc;
    use edurural_core::types::QuizResult;
    use pretty_assertions::assert_eq;

    fn queue_one(state: &AppState) {
        let result = QuizResult::new("student_1", "math_1", 40, vec![0, -1], Utc::now());
        state.repo().unwrap().record_submission(&result).unwrap();
    }

    #[tokio::test]
    async fn manual_sync_offline_is_skipped() {
        let h = harness(false);
        queue_one(&h.state);
        assert_eq!(
            manual_sync(&h.state).await.unwrap(),
            ManualSyncResponse::Skipped {
                reason: SkipReason::Offline
            }
        );
        assert_eq!(get_sync_status(&h.state).unwrap().pending_count, 1);
    }

    #[tokio::test]
    async fn manual_sync_after_reconnect_drains_queue() {
        let h = harness(false);
        queue_one(&h.state);

        assert!(set_connectivity(true, &h.state));
        let response = manual_sync(&h.state).await.unwrap();
        match response {
            ManualSyncResponse::Completed { report } => assert_eq!(report.succeeded, 1),
            other => panic!("unexpected {other:?}"),
        }

        let status = get_sync_status(&h.state).unwrap();
        assert_eq!(
            status,
            SyncStatusResponse {
                is_syncing: false,
                is_online: true,
                pending_count: 0,
                storage_degraded: true,
            }
        );
        assert_eq!(h.remote.calls().len(), 1);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_value(ManualSyncResponse::Skipped {
            reason: SkipReason::AlreadyInProgress,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "status": "skipped", "reason": "already_in_progress" })
        );
    }
}
