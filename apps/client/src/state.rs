//! Application state.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::connectivity::ConnectivityMonitor;
use crate::db::{DbError, SqliteRepository, StorageMode};
use crate::remote::RemoteService;
use crate::sync::{SyncEngine, SyncOptions};
use edurural_core::types::SyncIntent;

/// Capacity of the background sync intent channel.
const INTENT_CHANNEL_CAPACITY: usize = 32;

/// Everything a command needs. Built once at startup and passed by reference.
pub struct AppState {
    pub repository: Arc<Mutex<SqliteRepository>>,
    pub storage_mode: StorageMode,
    pub connectivity: ConnectivityMonitor,
    pub sync: SyncEngine,
    pub remote: Arc<dyn RemoteService>,
    pub intents: mpsc::Sender<SyncIntent>,
}

impl AppState {
    /// Build the state plus the receiving end of the intent channel, which
    /// belongs to the sync scheduler.
    pub fn new(
        repository: SqliteRepository,
        storage_mode: StorageMode,
        remote: Arc<dyn RemoteService>,
        connectivity: ConnectivityMonitor,
        options: SyncOptions,
    ) -> (Self, mpsc::Receiver<SyncIntent>) {
        let repository = Arc::new(Mutex::new(repository));
        let sync = SyncEngine::new(
            repository.clone(),
            remote.clone(),
            connectivity.clone(),
            options,
        );
        let (intents, intent_rx) = mpsc::channel(INTENT_CHANNEL_CAPACITY);

        (
            Self {
                repository,
                storage_mode,
                connectivity,
                sync,
                remote,
                intents,
            },
            intent_rx,
        )
    }

    pub fn repo(&self) -> Result<MutexGuard<'_, SqliteRepository>, DbError> {
        self.repository.lock().map_err(|_| DbError::LockPoisoned)
    }
}
