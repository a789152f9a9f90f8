use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub struct Metrics {
    pub messages_delivered: AtomicU64,
    pub messages_failed: AtomicU64,
    pub batches_dispatched: AtomicU64,
    pub batches_scheduled: AtomicU64,
    pub scheduled_batches_completed: AtomicU64,
    pub generation_fallbacks: AtomicU64,
    pub quota_refusals: AtomicU64,
    pub user_starts: AtomicU64,
    pub broadcast_deliveries: AtomicU64,
    pub errors: AtomicU64,
    pub start_time: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub messages_delivered: u64,
    pub messages_failed: u64,
    pub batches_dispatched: u64,
    pub batches_scheduled: u64,
    pub scheduled_batches_completed: u64,
    pub generation_fallbacks: u64,
    pub quota_refusals: u64,
    pub user_starts: u64,
    pub broadcast_deliveries: u64,
    pub errors: u64,
    pub uptime_secs: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            messages_delivered: AtomicU64::new(0),
            messages_failed: AtomicU64::new(0),
            batches_dispatched: AtomicU64::new(0),
            batches_scheduled: AtomicU64::new(0),
            scheduled_batches_completed: AtomicU64::new(0),
            generation_fallbacks: AtomicU64::new(0),
            quota_refusals: AtomicU64::new(0),
            user_starts: AtomicU64::new(0),
            broadcast_deliveries: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_delivery(&self, delivered: bool) {
        if delivered {
            self.messages_delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.messages_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn increment_batches_dispatched(&self) {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_batches_scheduled(&self) {
        self.batches_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_scheduled_completed(&self) {
        self.scheduled_batches_completed
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_generation_fallbacks(&self, count: u64) {
        self.generation_fallbacks.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_quota_refusals(&self) {
        self.quota_refusals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_user_starts(&self) {
        self.user_starts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_broadcast_deliveries(&self, count: u64) {
        self.broadcast_deliveries.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            messages_failed: self.messages_failed.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            batches_scheduled: self.batches_scheduled.load(Ordering::Relaxed),
            scheduled_batches_completed: self.scheduled_batches_completed.load(Ordering::Relaxed),
            generation_fallbacks: self.generation_fallbacks.load(Ordering::Relaxed),
            quota_refusals: self.quota_refusals.load(Ordering::Relaxed),
            user_starts: self.user_starts.load(Ordering::Relaxed),
            broadcast_deliveries: self.broadcast_deliveries.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }
}
