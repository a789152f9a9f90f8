//! Rolling-window message quota.
//!
//! The limiter only tracks and resets counters; callers compare against the ceiling and skip it
//! entirely for the operator.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::db::DbError;
use crate::models::UserQuota;
use crate::store::DispatchStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    pub count: u32,
    pub last_reset: DateTime<Utc>,
}

#[derive(Clone)]
pub struct QuotaLimiter {
    store: Arc<dyn DispatchStore>,
    window: Duration,
}

impl QuotaLimiter {
    pub fn new(store: Arc<dyn DispatchStore>, window: Duration) -> Self {
        Self { store, window }
    }

    /// Reads the user's counter, creating it on first use and zeroing it once the window elapsed.
    pub fn check_and_maybe_reset(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<QuotaStatus, DbError> {
        let quota = match self.store.get_quota(user_id)? {
            None => self.store.upsert_quota(&UserQuota {
                user_id,
                message_count: 0,
                last_reset: now,
            })?,
            Some(quota) if now - quota.last_reset > self.window => {
                tracing::debug!("Quota window elapsed for user {}, resetting", user_id);
                self.store.upsert_quota(&UserQuota {
                    user_id,
                    message_count: 0,
                    last_reset: now,
                })?
            }
            Some(quota) => quota,
        };

        Ok(QuotaStatus {
            count: quota.message_count.max(0) as u32,
            last_reset: quota.last_reset,
        })
    }

    /// Charges `amount` messages. Capacity must already have been checked by the caller.
    pub fn consume(&self, user_id: i64, amount: u32) -> Result<(), DbError> {
        if amount == 0 {
            return Ok(());
        }
        self.store.increment_quota(user_id, amount as i32)
    }

    pub fn time_until_reset(&self, status: &QuotaStatus, now: DateTime<Utc>) -> Duration {
        let remaining = status.last_reset + self.window - now;
        if remaining < Duration::zero() {
            Duration::zero()
        } else {
            remaining
        }
    }
}
