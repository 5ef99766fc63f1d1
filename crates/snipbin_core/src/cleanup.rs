//! Periodic hard-deletion of expired document versions.

use crate::constants::{CLEANUP_RUN_TIMEOUT, DEFAULT_CLEANUP_INTERVAL};
use crate::db::Database;
use crate::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Background loop that sweeps expired versions until shutdown.
pub struct CleanupScheduler;

impl CleanupScheduler {
    /// Interval actually used for `configured`; zero falls back to the default.
    pub fn effective_interval(configured: Duration) -> Duration {
        if configured.is_zero() {
            DEFAULT_CLEANUP_INTERVAL
        } else {
            configured
        }
    }

    /// Start the sweep loop on the current tokio runtime.
    ///
    /// The first sweep runs one interval after start. A failed or timed-out
    /// sweep is logged and the loop keeps going until `shutdown` fires.
    ///
    /// # Returns
    /// `None` when `expire_after` is zero, since there is nothing to expire.
    pub fn spawn(
        db: Arc<Database>,
        interval: Duration,
        expire_after: Duration,
        shutdown: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        if expire_after.is_zero() {
            tracing::debug!("Document expiry disabled; cleanup scheduler not started");
            return None;
        }
        let interval = Self::effective_interval(interval);
        tracing::info!(
            interval_secs = interval.as_secs(),
            expire_after_secs = expire_after.as_secs(),
            "Starting cleanup scheduler"
        );

        Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        match Self::run_once(db.clone(), expire_after).await {
                            Ok(deleted) => tracing::debug!(deleted, "Cleanup run finished"),
                            Err(err) => tracing::error!("Cleanup run failed: {}", err),
                        }
                    }
                }
            }
            tracing::info!("Cleanup scheduler stopped");
        }))
    }

    /// Run one sweep on the blocking pool, bounded by the per-run deadline.
    ///
    /// The sweep itself watches the deadline and rolls back when it passes,
    /// so a slow run never outlives its slot holding the write lock.
    ///
    /// # Returns
    /// Number of version rows deleted.
    ///
    /// # Errors
    /// Returns [`AppError::Transient`] when the deadline passes or the task
    /// panics, or the storage error from the sweep itself.
    pub async fn run_once(db: Arc<Database>, expire_after: Duration) -> Result<usize, AppError> {
        let deadline = std::time::Instant::now() + CLEANUP_RUN_TIMEOUT;
        tokio::task::spawn_blocking(move || {
            db.documents
                .delete_expired_documents_before(expire_after, deadline)
        })
        .await
        .map_err(|join_err| AppError::Transient(format!("Cleanup task failed: {}", join_err)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ManualClock, StoreOptions};
    use crate::test_support::setup_temp_db_with;
    use tempfile::TempDir;

    const T: u64 = 1_700_000_000;

    fn clocked_db() -> (Arc<Database>, Arc<ManualClock>, TempDir) {
        let clock = Arc::new(ManualClock::at(T));
        let (db, dir) = setup_temp_db_with(StoreOptions {
            clock: clock.clone(),
            ..StoreOptions::default()
        });
        (Arc::new(db), clock, dir)
    }

    #[test]
    fn zero_interval_falls_back_to_default() {
        assert_eq!(
            CleanupScheduler::effective_interval(Duration::ZERO),
            DEFAULT_CLEANUP_INTERVAL
        );
        assert_eq!(
            CleanupScheduler::effective_interval(Duration::from_secs(5)),
            Duration::from_secs(5)
        );
    }

    #[tokio::test]
    async fn zero_expiry_spawns_nothing() {
        let (db, _clock, _dir) = clocked_db();
        let handle = CleanupScheduler::spawn(
            db,
            Duration::from_millis(10),
            Duration::ZERO,
            CancellationToken::new(),
        );
        assert!(handle.is_none());
    }

    #[tokio::test]
    async fn run_once_deletes_expired_versions() {
        let (db, clock, _dir) = clocked_db();
        let doc = db
            .documents
            .create_document("old", "plaintext")
            .expect("create");

        clock.set(T + 61);
        let deleted = CleanupScheduler::run_once(db.clone(), Duration::from_secs(60))
            .await
            .expect("sweep");
        assert_eq!(deleted, 1);
        assert!(matches!(
            db.documents.get_document(&doc.id),
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn scheduler_sweeps_until_cancelled() {
        let (db, clock, _dir) = clocked_db();
        let doc = db
            .documents
            .create_document("soon gone", "plaintext")
            .expect("create");
        clock.set(T + 3_600);

        let shutdown = CancellationToken::new();
        let handle = CleanupScheduler::spawn(
            db.clone(),
            Duration::from_millis(20),
            Duration::from_secs(60),
            shutdown.clone(),
        )
        .expect("scheduler should start");

        let mut gone = false;
        for _ in 0..100 {
            if db.documents.get_version_count(&doc.id).expect("count") == 0 {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(gone, "scheduler should have expired the document");

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler stops on cancel")
            .expect("scheduler task does not panic");
    }
}
