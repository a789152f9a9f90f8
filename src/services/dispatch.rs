//! Sequential batch delivery with randomized pacing and per-message accounting.

use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use super::quota::QuotaLimiter;
use crate::models::{DispatchStatus, NewDispatchRecord};
use crate::observability::{OperatorNotifier, Severity, METRICS};
use crate::store::DispatchStore;

#[async_trait]
pub trait Deliverer: Send + Sync {
    /// One delivery attempt. Transport errors are reported as `false`.
    async fn deliver(&self, endpoint_link: &str, text: &str) -> bool;
}

/// Receives live progress while a batch is being sent.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, attempted: usize, total: usize);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub min: Duration,
    pub max: Duration,
}

impl Pacing {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn draw(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let millis =
            rand::thread_rng().gen_range(self.min.as_millis() as u64..=self.max.as_millis() as u64);
        Duration::from_millis(millis)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub success_count: usize,
    pub failed_count: usize,
}

impl DispatchOutcome {
    pub fn total(&self) -> usize {
        self.success_count + self.failed_count
    }
}

pub struct DispatchWorker {
    store: Arc<dyn DispatchStore>,
    deliverer: Arc<dyn Deliverer>,
    limiter: QuotaLimiter,
    notifier: Arc<dyn OperatorNotifier>,
    pacing: Pacing,
    operator_id: i64,
}

impl DispatchWorker {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        deliverer: Arc<dyn Deliverer>,
        limiter: QuotaLimiter,
        notifier: Arc<dyn OperatorNotifier>,
        pacing: Pacing,
        operator_id: i64,
    ) -> Self {
        Self {
            store,
            deliverer,
            limiter,
            notifier,
            pacing,
            operator_id,
        }
    }

    /// Sends `messages` in order, one attempt each. Never fails as a whole: delivery failures end
    /// up in `failed_count`, storage failures are logged and reported to the operator.
    pub async fn dispatch_batch(
        &self,
        user_id: i64,
        endpoint_link: &str,
        messages: &[String],
        progress: Option<&dyn ProgressSink>,
    ) -> DispatchOutcome {
        let total = messages.len();
        let mut outcome = DispatchOutcome::default();

        tracing::info!(
            "Dispatching {} messages for user {} to {}",
            total,
            user_id,
            endpoint_link
        );

        for (idx, message) in messages.iter().enumerate() {
            if idx > 0 {
                let delay = self.pacing.draw();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            let delivered = self.deliverer.deliver(endpoint_link, message).await;
            METRICS.record_delivery(delivered);

            if delivered {
                outcome.success_count += 1;
            } else {
                outcome.failed_count += 1;
            }

            let record = NewDispatchRecord {
                user_id,
                endpoint_link,
                message_text: message,
                status: DispatchStatus::from_delivered(delivered).as_str(),
            };
            if let Err(e) = self.store.append_dispatch_record(record) {
                tracing::error!(
                    "Failed to record message {}/{} for user {}: {}",
                    idx + 1,
                    total,
                    user_id,
                    e
                );
                METRICS.increment_errors();
                self.notifier
                    .alert(
                        Severity::Error,
                        "Store",
                        &format!("Failed to append dispatch record: {}", e),
                    )
                    .await;
            }

            if let Some(sink) = progress {
                sink.report(idx + 1, total).await;
            }
        }

        if user_id != self.operator_id {
            if let Err(e) = self.limiter.consume(user_id, total as u32) {
                tracing::error!("Failed to charge quota for user {}: {}", user_id, e);
                METRICS.increment_errors();
                self.notifier
                    .alert(
                        Severity::Error,
                        "Quota",
                        &format!("Failed to charge {} messages to {}: {}", total, user_id, e),
                    )
                    .await;
            }
        }

        METRICS.increment_batches_dispatched();

        tracing::info!(
            "Batch for user {} finished: {} ok, {} failed",
            user_id,
            outcome.success_count,
            outcome.failed_count
        );

        outcome
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every attempt; messages containing "fail" are rejected.
    pub struct RecordingDeliverer {
        pub sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingDeliverer {
        pub fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
            }
        }

        pub fn sent_texts(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(_, text)| text.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Deliverer for RecordingDeliverer {
        async fn deliver(&self, endpoint_link: &str, text: &str) -> bool {
            self.sent
                .lock()
                .unwrap()
                .push((endpoint_link.to_string(), text.to_string()));
            !text.contains("fail")
        }
    }

    pub struct RecordingProgress {
        pub reports: Mutex<Vec<(usize, usize)>>,
    }

    impl RecordingProgress {
        pub fn new() -> Self {
            Self {
                reports: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ProgressSink for RecordingProgress {
        async fn report(&self, attempted: usize, total: usize) {
            self.reports.lock().unwrap().push((attempted, total));
        }
    }
}
