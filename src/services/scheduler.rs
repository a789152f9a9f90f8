//! Background executor for future-dated batches.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::dispatch::{DispatchOutcome, DispatchWorker};
use super::quota::QuotaLimiter;
use crate::db::DbError;
use crate::models::ScheduledBatch;
use crate::observability::{OperatorNotifier, Severity, METRICS};
use crate::store::DispatchStore;

/// Told about every batch the scheduler has finished.
#[async_trait]
pub trait BatchObserver: Send + Sync {
    async fn batch_completed(&self, batch: &ScheduledBatch, outcome: DispatchOutcome);
}

#[derive(Debug)]
pub enum SchedulerError {
    ListDue(DbError),
}

impl std::fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerError::ListDue(e) => write!(f, "Failed to list due batches: {}", e),
        }
    }
}

impl std::error::Error for SchedulerError {}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickSummary {
    pub due: usize,
    pub completed: Vec<i32>,
    /// Batches that were dispatched but could not be marked completed.
    pub unmarked: Vec<i32>,
}

pub struct Scheduler {
    store: Arc<dyn DispatchStore>,
    worker: Arc<DispatchWorker>,
    limiter: QuotaLimiter,
    notifier: Arc<dyn OperatorNotifier>,
    observer: Option<Arc<dyn BatchObserver>>,
    interval: Duration,
    operator_id: i64,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        worker: Arc<DispatchWorker>,
        limiter: QuotaLimiter,
        notifier: Arc<dyn OperatorNotifier>,
        interval: Duration,
        operator_id: i64,
    ) -> Self {
        Self {
            store,
            worker,
            limiter,
            notifier,
            observer: None,
            interval,
            operator_id,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub async fn run(self) {
        tracing::info!(
            "Starting batch scheduler (interval {}s)...",
            self.interval.as_secs()
        );

        loop {
            match self.tick(Utc::now()).await {
                Ok(summary) if summary.due > 0 => {
                    tracing::info!(
                        "Scheduler tick: {} due, {} completed",
                        summary.due,
                        summary.completed.len()
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("Error in batch scheduler: {}", e);
                    METRICS.increment_errors();
                    self.notifier
                        .alert(Severity::Error, "Scheduler", &e.to_string())
                        .await;
                }
            }

            tokio::time::sleep(self.interval).await;
        }
    }

    /// One poll: dispatches every batch due at `now`, oldest first, and marks each completed.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickSummary, SchedulerError> {
        let due = self
            .store
            .list_due_scheduled_batches(now)
            .map_err(SchedulerError::ListDue)?;

        let mut summary = TickSummary {
            due: due.len(),
            ..Default::default()
        };

        for batch in due {
            let outcome = self.execute(&batch, now).await;

            match self.store.mark_batch_completed(batch.id) {
                Ok(true) => {
                    METRICS.increment_scheduled_completed();
                    summary.completed.push(batch.id);
                }
                Ok(false) => {
                    tracing::warn!("Scheduled batch {} was already completed", batch.id);
                }
                Err(e) => {
                    tracing::error!("Failed to mark batch {} completed: {}", batch.id, e);
                    METRICS.increment_errors();
                    self.notifier
                        .alert(
                            Severity::Critical,
                            "Scheduler",
                            &format!(
                                "Batch {} was dispatched but is still marked scheduled: {}",
                                batch.id, e
                            ),
                        )
                        .await;
                    summary.unmarked.push(batch.id);
                    continue;
                }
            }

            if let Some(observer) = &self.observer {
                observer.batch_completed(&batch, outcome).await;
            }
        }

        Ok(summary)
    }

    async fn execute(&self, batch: &ScheduledBatch, now: DateTime<Utc>) -> DispatchOutcome {
        tracing::info!(
            "Executing scheduled batch {} for user {} ({} messages)",
            batch.id,
            batch.user_id,
            batch.messages.len()
        );

        // The owner's counter must exist before the worker charges it.
        if batch.user_id != self.operator_id {
            if let Err(e) = self.limiter.check_and_maybe_reset(batch.user_id, now) {
                tracing::warn!(
                    "Could not refresh quota of user {} before batch {}: {}",
                    batch.user_id,
                    batch.id,
                    e
                );
            }
        }

        self.worker
            .dispatch_batch(batch.user_id, &batch.endpoint_link, &batch.messages, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchStatus, NewScheduledBatch};
    use crate::observability::alerts::RecordingNotifier;
    use crate::services::dispatch::testing::RecordingDeliverer;
    use crate::services::dispatch::Pacing;
    use crate::store::memory::MemoryStore;
    use chrono::Duration as ChronoDuration;
    use std::sync::Mutex;

    const OPERATOR: i64 = 1;

    struct CollectingObserver {
        seen: Mutex<Vec<(i32, DispatchOutcome)>>,
    }

    #[async_trait]
    impl BatchObserver for CollectingObserver {
        async fn batch_completed(&self, batch: &ScheduledBatch, outcome: DispatchOutcome) {
            self.seen.lock().unwrap().push((batch.id, outcome));
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        deliverer: Arc<RecordingDeliverer>,
        notifier: Arc<RecordingNotifier>,
        observer: Arc<CollectingObserver>,
        scheduler: Scheduler,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let deliverer = Arc::new(RecordingDeliverer::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let observer = Arc::new(CollectingObserver {
            seen: Mutex::new(Vec::new()),
        });
        let limiter = QuotaLimiter::new(store.clone(), ChronoDuration::hours(24));
        let worker = Arc::new(DispatchWorker::new(
            store.clone(),
            deliverer.clone(),
            limiter.clone(),
            notifier.clone(),
            Pacing::none(),
            OPERATOR,
        ));
        let scheduler = Scheduler::new(
            store.clone(),
            worker,
            limiter,
            notifier.clone(),
            Duration::from_secs(60),
            OPERATOR,
        )
        .with_observer(observer.clone());

        Fixture {
            store,
            deliverer,
            notifier,
            observer,
            scheduler,
        }
    }

    fn schedule(store: &MemoryStore, user_id: i64, at: DateTime<Utc>, messages: &[&str]) -> i32 {
        let messages: Vec<String> = messages.iter().map(|s| s.to_string()).collect();
        store
            .create_scheduled_batch(NewScheduledBatch {
                user_id,
                endpoint_link: "https://ngl.link/bob",
                messages: &messages,
                scheduled_time: at,
                status: BatchStatus::Scheduled.as_str(),
            })
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_batch_runs_only_once_due() {
        let f = fixture();
        let now = Utc::now();
        let id = schedule(&f.store, OPERATOR, now + ChronoDuration::hours(1), &["a", "b", "c"]);

        let early = f
            .scheduler
            .tick(now + ChronoDuration::minutes(30))
            .await
            .unwrap();
        assert_eq!(early.due, 0);
        assert!(f.deliverer.sent_texts().is_empty());

        let on_time = f
            .scheduler
            .tick(now + ChronoDuration::minutes(61))
            .await
            .unwrap();
        assert_eq!(on_time.completed, vec![id]);
        assert_eq!(f.deliverer.sent_texts(), vec!["a", "b", "c"]);
        assert_eq!(f.store.records().len(), 3);

        let batch = &f.store.batches()[0];
        assert_eq!(batch.status_enum(), Some(BatchStatus::Completed));
        assert!(batch.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_completed_batch_is_never_redispatched() {
        let f = fixture();
        let now = Utc::now();
        schedule(&f.store, OPERATOR, now, &["only"]);

        f.scheduler.tick(now).await.unwrap();
        let again = f
            .scheduler
            .tick(now + ChronoDuration::minutes(5))
            .await
            .unwrap();

        assert_eq!(again.due, 0);
        assert_eq!(f.deliverer.sent_texts().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_messages_still_complete_batch() {
        let f = fixture();
        let now = Utc::now();
        let id = schedule(&f.store, OPERATOR, now, &["ok", "will fail"]);

        let summary = f.scheduler.tick(now).await.unwrap();

        assert_eq!(summary.completed, vec![id]);
        let seen = f.observer.seen.lock().unwrap();
        assert_eq!(seen[0].1.success_count, 1);
        assert_eq!(seen[0].1.failed_count, 1);
    }

    #[tokio::test]
    async fn test_due_batches_run_oldest_first() {
        let f = fixture();
        let now = Utc::now();
        schedule(&f.store, OPERATOR, now - ChronoDuration::minutes(1), &["second"]);
        schedule(&f.store, OPERATOR, now - ChronoDuration::minutes(10), &["first"]);

        f.scheduler.tick(now).await.unwrap();

        assert_eq!(f.deliverer.sent_texts(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_non_operator_batch_is_charged_on_dispatch() {
        let f = fixture();
        let now = Utc::now();
        schedule(&f.store, 42, now, &["x", "y"]);

        f.scheduler.tick(now).await.unwrap();

        assert_eq!(f.store.quota(42).unwrap().message_count, 2);
    }

    #[tokio::test]
    async fn test_store_outage_is_an_iteration_error() {
        let f = fixture();
        f.store.set_unavailable(true);

        let result = f.scheduler.tick(Utc::now()).await;

        assert!(matches!(result, Err(SchedulerError::ListDue(_))));
        assert_eq!(f.notifier.alert_count(), 0);
    }
}
