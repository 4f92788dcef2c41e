//! Sync engine: drains unsynced quiz results to the backend.
//!
//! One cycle at a time. A trigger that arrives mid-cycle is dropped, not
//! queued; anything written meanwhile is picked up by the next cycle.

pub mod scheduler;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::connectivity::ConnectivityMonitor;
use crate::db::{DbError, PendingResult, QueueRepository, ResultRepository, SqliteRepository};
use crate::remote::{RemoteError, RemoteService};
use edurural_core::types::{QueueEntryKind, QuizResult};

pub use scheduler::{SyncScheduler, SyncSchedulerHandle};

/// Sync errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Failed to read pending results: {0}")]
    Store(#[from] DbError),
}

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Online,
    Periodic,
    Manual,
    BackgroundIntent,
}

/// Why a trigger did not run a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyInProgress,
    Offline,
}

/// Per-cycle tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Entries read at the start of the cycle.
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub malformed: usize,
    /// Entries parked this cycle: malformed rows, permanent rejections, and
    /// failures past the dead-letter threshold.
    pub dead_lettered: usize,
}

/// Result of a call to [`SyncEngine::sync_now`].
#[derive(Debug)]
pub enum SyncOutcome {
    Completed(SyncReport),
    Skipped(SkipReason),
    /// Reading the queue failed. Nothing was changed.
    Aborted(SyncError),
}

/// Broadcast to subscribers after a non-empty cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum SyncEvent {
    /// `processed` counts entries attempted, not entries that succeeded.
    Completed { processed: usize },
}

/// Engine state as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncState {
    Idle,
    Syncing,
}

/// How failed entries are rescheduled.
///
/// The default retries every cycle forever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff_base: Option<Duration>,
    pub max_backoff: Duration,
    pub dead_letter_after: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff_base: None,
            max_backoff: Duration::from_secs(60 * 60),
            dead_letter_after: None,
        }
    }
}

impl RetryPolicy {
    pub fn with_backoff(base: Duration, max_backoff: Duration) -> Self {
        Self {
            backoff_base: Some(base),
            max_backoff,
            ..Self::default()
        }
    }

    pub fn dead_letter_after(mut self, failures: u32) -> Self {
        self.dead_letter_after = Some(failures);
        self
    }

    /// Earliest time the entry may be retried after its `retries`-th failure.
    /// `None` means the next cycle.
    pub fn next_attempt_at(&self, retries: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let base = self.backoff_base?;
        let exponent = retries.saturating_sub(1).min(20);
        let delay = base.saturating_mul(1u32 << exponent).min(self.max_backoff);
        chrono::Duration::from_std(delay).ok().map(|d| now + d)
    }

    pub fn should_dead_letter(&self, retries: u32) -> bool {
        self.dead_letter_after.is_some_and(|limit| retries >= limit)
    }
}

/// What happened to an entry after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureDisposition {
    pub retries: u32,
    pub dead_lettered: bool,
}

/// The slice of the local store the engine needs.
pub trait SyncStore: Send + Sync {
    fn pending_results(&self, now: DateTime<Utc>) -> Result<Vec<PendingResult>, DbError>;
    fn mark_result_synced(&self, id: &str) -> Result<(), DbError>;
    fn record_failure(
        &self,
        ref_id: &str,
        policy: &RetryPolicy,
        now: DateTime<Utc>,
    ) -> Result<FailureDisposition, DbError>;
    /// Dead-letter an entry that can never be sent.
    fn park(&self, ref_id: &str) -> Result<(), DbError>;
}

/// Make sure `ref_id` has a queue row to carry retry state.
fn ensure_queued(repo: &SqliteRepository, ref_id: &str) -> Result<(), DbError> {
    if repo.get_queue_entries_for(ref_id)?.is_empty() {
        let payload = serde_json::json!({ "resultId": ref_id });
        repo.enqueue(QueueEntryKind::QuizResult, ref_id, &payload)?;
    }
    Ok(())
}

impl SyncStore for Mutex<SqliteRepository> {
    fn pending_results(&self, now: DateTime<Utc>) -> Result<Vec<PendingResult>, DbError> {
        let repo = self.lock().map_err(|_| DbError::LockPoisoned)?;
        repo.get_unsynced_results(now)
    }

    fn mark_result_synced(&self, id: &str) -> Result<(), DbError> {
        let repo = self.lock().map_err(|_| DbError::LockPoisoned)?;
        repo.mark_result_synced(id)
    }

    fn record_failure(
        &self,
        ref_id: &str,
        policy: &RetryPolicy,
        now: DateTime<Utc>,
    ) -> Result<FailureDisposition, DbError> {
        let repo = self.lock().map_err(|_| DbError::LockPoisoned)?;
        ensure_queued(&repo, ref_id)?;
        let retries = repo.increment_retries(ref_id)?.unwrap_or(1);

        let dead_lettered = policy.should_dead_letter(retries);
        let next_attempt_at = if dead_lettered {
            None
        } else {
            policy.next_attempt_at(retries, now)
        };
        repo.schedule_retry(ref_id, next_attempt_at, dead_lettered)?;

        Ok(FailureDisposition {
            retries,
            dead_lettered,
        })
    }

    fn park(&self, ref_id: &str) -> Result<(), DbError> {
        let repo = self.lock().map_err(|_| DbError::LockPoisoned)?;
        ensure_queued(&repo, ref_id)?;
        repo.schedule_retry(ref_id, None, true)
    }
}

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub policy: RetryPolicy,
    /// Upper bound on a single remote call.
    pub remote_timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::default(),
            remote_timeout: Duration::from_secs(30),
        }
    }
}

/// Inner state shared across clones.
struct SyncEngineInner {
    store: Arc<dyn SyncStore>,
    remote: Arc<dyn RemoteService>,
    connectivity: ConnectivityMonitor,
    options: SyncOptions,
    in_progress: AtomicBool,
    events: broadcast::Sender<SyncEvent>,
}

/// Holds the in-progress flag for one cycle and clears it on drop.
struct SyncGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SyncGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Sync engine for pushing local results to the backend.
///
/// Clone-able; all state lives behind an `Arc`.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<SyncEngineInner>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn SyncStore>,
        remote: Arc<dyn RemoteService>,
        connectivity: ConnectivityMonitor,
        options: SyncOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(SyncEngineInner {
                store,
                remote,
                connectivity,
                options,
                in_progress: AtomicBool::new(false),
                events,
            }),
        }
    }

    pub fn state(&self) -> SyncState {
        if self.is_syncing() {
            SyncState::Syncing
        } else {
            SyncState::Idle
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.in_progress.load(Ordering::Acquire)
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.inner.connectivity
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Run one drain cycle unless offline or already running.
    pub async fn sync_now(&self, trigger: SyncTrigger) -> SyncOutcome {
        if !self.inner.connectivity.is_online() {
            tracing::debug!(?trigger, "offline, skipping sync");
            return SyncOutcome::Skipped(SkipReason::Offline);
        }

        let Some(_guard) = SyncGuard::acquire(&self.inner.in_progress) else {
            tracing::debug!(?trigger, "sync already in progress");
            return SyncOutcome::Skipped(SkipReason::AlreadyInProgress);
        };

        let span = tracing::info_span!(
            "sync_cycle",
            cycle_id = %uuid::Uuid::new_v4(),
            trigger = ?trigger
        );
        self.run_cycle().instrument(span).await
    }

    async fn run_cycle(&self) -> SyncOutcome {
        let store = &self.inner.store;

        let pending = match store.pending_results(Utc::now()) {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(error = %e, "could not read pending results");
                return SyncOutcome::Aborted(SyncError::Store(e));
            }
        };

        if pending.is_empty() {
            tracing::debug!("nothing to sync");
            return SyncOutcome::Completed(SyncReport::default());
        }

        let mut report = SyncReport {
            processed: pending.len(),
            ..SyncReport::default()
        };
        tracing::info!(pending = report.processed, "syncing quiz results");

        for entry in pending {
            let result = match entry {
                PendingResult::Ready(result) => result,
                PendingResult::Malformed { id, reason } => {
                    tracing::warn!(result_id = %id, %reason, "parking malformed queue entry");
                    report.malformed += 1;
                    self.park(&id, &mut report);
                    continue;
                }
            };

            match self.push(&result).await {
                Ok(()) => match store.mark_result_synced(&result.id) {
                    Ok(()) => report.succeeded += 1,
                    Err(e) => {
                        tracing::warn!(result_id = %result.id, error = %e, "failed to mark result synced");
                        report.failed += 1;
                    }
                },
                Err(e) if !e.is_transient() => {
                    tracing::warn!(result_id = %result.id, error = %e, "backend refused quiz result, parking it");
                    report.failed += 1;
                    self.park(&result.id, &mut report);
                }
                Err(e) => {
                    tracing::warn!(result_id = %result.id, error = %e, "failed to sync quiz result");
                    report.failed += 1;
                    match store.record_failure(&result.id, &self.inner.options.policy, Utc::now()) {
                        Ok(disposition) if disposition.dead_lettered => {
                            tracing::warn!(
                                result_id = %result.id,
                                retries = disposition.retries,
                                "giving up on quiz result"
                            );
                            report.dead_lettered += 1;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(result_id = %result.id, error = %e, "failed to record retry");
                        }
                    }
                }
            }
        }

        tracing::info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            malformed = report.malformed,
            dead_lettered = report.dead_lettered,
            "sync cycle finished"
        );
        // No receivers is fine.
        let _ = self.inner.events.send(SyncEvent::Completed {
            processed: report.processed,
        });

        SyncOutcome::Completed(report)
    }

    fn park(&self, id: &str, report: &mut SyncReport) {
        match self.inner.store.park(id) {
            Ok(()) => report.dead_lettered += 1,
            Err(e) => tracing::warn!(result_id = %id, error = %e, "failed to park entry"),
        }
    }

    async fn push(&self, result: &QuizResult) -> Result<(), RemoteError> {
        let timeout = self.inner.options.remote_timeout;
        let call = self.inner.remote.save_quiz_result(
            &result.student_id,
            &result.lesson_id,
            result.score,
            &result.answers,
        );
        match tokio::time::timeout(timeout, call).await {
            Ok(saved) => saved.map(|_| ()),
            Err(_) => Err(RemoteError::Timeout(timeout)),
        }
    }
}
