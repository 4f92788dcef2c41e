//! Background loop that decides when the engine runs.
//!
//! Triggers: a transition to online, the periodic tick while online, and
//! background sync intents sent by the shell proxy.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{SyncEngine, SyncTrigger};
use crate::connectivity::ConnectivityProbe;
use edurural_core::types::SyncIntent;

pub struct SyncScheduler {
    engine: SyncEngine,
    interval: Duration,
    probe: Option<Arc<dyn ConnectivityProbe>>,
}

/// Running scheduler. Dropping it leaves the task running; call
/// [`SyncSchedulerHandle::shutdown`] to stop it.
pub struct SyncSchedulerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SyncSchedulerHandle {
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "sync scheduler task ended abnormally");
        }
    }
}

impl SyncScheduler {
    pub fn new(engine: SyncEngine, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            probe: None,
        }
    }

    /// Refresh connectivity from `probe` on every tick.
    pub fn with_probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn spawn(self, intents: mpsc::Receiver<SyncIntent>) -> SyncSchedulerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        // Subscribe before spawning so a transition right after this call is seen.
        let online_rx = self.engine.connectivity().subscribe();
        let task = tokio::spawn(self.run(online_rx, intents, shutdown_rx));
        SyncSchedulerHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    async fn run(
        self,
        mut online_rx: watch::Receiver<bool>,
        mut intents: mpsc::Receiver<SyncIntent>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let connectivity = self.engine.connectivity().clone();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately.
        ticker.tick().await;
        let mut intents_open = true;

        tracing::info!(interval_secs = self.interval.as_secs(), "sync scheduler started");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,

                changed = online_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = *online_rx.borrow_and_update();
                    if online {
                        self.engine.sync_now(SyncTrigger::Online).await;
                    }
                }

                _ = ticker.tick() => {
                    if let Some(probe) = &self.probe {
                        connectivity.set_online(probe.check().await);
                    }
                    if connectivity.is_online() {
                        // A probe-driven transition is handled here, not twice.
                        let _ = online_rx.borrow_and_update();
                        self.engine.sync_now(SyncTrigger::Periodic).await;
                    }
                }

                intent = intents.recv(), if intents_open => match intent {
                    Some(intent) if connectivity.is_online() => {
                        tracing::debug!(tag = %intent.tag, "background sync requested");
                        self.engine.sync_now(SyncTrigger::BackgroundIntent).await;
                    }
                    Some(intent) => {
                        tracing::debug!(tag = %intent.tag, "background sync deferred until online");
                    }
                    None => intents_open = false,
                },
            }
        }

        tracing::info!("sync scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ConnectivityMonitor;
    use crate::db::{ResultRepository, SqliteRepository};
    use crate::remote::fake::FakeRemote;
    use crate::sync::{SyncEvent, SyncOptions};
    use async_trait::async_trait;
    use chrono::Utc;
    use edurural_core::types::QuizResult;
    use std::sync::Mutex;
    use tokio::sync::broadcast;

    const LONG: Duration = Duration::from_secs(3600);

    fn engine(online: bool) -> (SyncEngine, Arc<Mutex<SqliteRepository>>, Arc<FakeRemote>) {
        let store = Arc::new(Mutex::new(SqliteRepository::open_in_memory().unwrap()));
        let remote = Arc::new(FakeRemote::new());
        let engine = SyncEngine::new(
            store.clone(),
            remote.clone(),
            ConnectivityMonitor::new(online),
            SyncOptions::default(),
        );
        let result = QuizResult::new("student_1", "math_1", 80, vec![0], Utc::now());
        store.lock().unwrap().record_submission(&result).unwrap();
        (engine, store, remote)
    }

    async fn next_event(events: &mut broadcast::Receiver<SyncEvent>) -> SyncEvent {
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("no sync event")
            .unwrap()
    }

    #[tokio::test]
    async fn going_online_triggers_sync() {
        let (engine, _store, remote) = engine(false);
        let mut events = engine.subscribe();
        let (_tx, rx) = mpsc::channel(4);
        let handle = SyncScheduler::new(engine.clone(), LONG).spawn(rx);

        engine.connectivity().set_online(true);
        assert_eq!(next_event(&mut events).await, SyncEvent::Completed { processed: 1 });
        assert_eq!(remote.calls().len(), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn intent_while_online_triggers_sync() {
        let (engine, _store, _remote) = engine(true);
        let mut events = engine.subscribe();
        let (tx, rx) = mpsc::channel(4);
        let handle = SyncScheduler::new(engine.clone(), LONG).spawn(rx);

        tx.send(SyncIntent::background()).await.unwrap();
        assert_eq!(next_event(&mut events).await, SyncEvent::Completed { processed: 1 });

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn intent_while_offline_waits_for_transition() {
        let (engine, store, remote) = engine(false);
        let mut events = engine.subscribe();
        let (tx, rx) = mpsc::channel(4);
        let handle = SyncScheduler::new(engine.clone(), LONG).spawn(rx);

        tx.send(SyncIntent::background()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(remote.calls().is_empty());

        engine.connectivity().set_online(true);
        next_event(&mut events).await;
        assert_eq!(store.lock().unwrap().count_unsynced_results().unwrap(), 0);

        handle.shutdown().await;
    }

    struct AlwaysUp;

    #[async_trait]
    impl ConnectivityProbe for AlwaysUp {
        async fn check(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn periodic_probe_brings_engine_online() {
        let (engine, _store, remote) = engine(false);
        let mut events = engine.subscribe();
        let (_tx, rx) = mpsc::channel(4);
        let handle = SyncScheduler::new(engine.clone(), Duration::from_millis(20))
            .with_probe(Arc::new(AlwaysUp))
            .spawn(rx);

        next_event(&mut events).await;
        assert!(engine.connectivity().is_online());
        assert_eq!(remote.calls().len(), 1);

        handle.shutdown().await;
    }
}
