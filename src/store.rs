//! Storage contract shared by the quota limiter, the dispatch worker and the scheduler.
//!
//! Every method is a single-row, auto-committing operation. Implementations must be safe to call
//! from several tasks at once.

use chrono::{DateTime, Utc};

use crate::db::DbError;
use crate::models::{DispatchRecord, NewBotUser, NewDispatchRecord, NewScheduledBatch};
use crate::models::{ScheduledBatch, UserQuota};

#[cfg(test)]
pub mod memory;

pub trait DispatchStore: Send + Sync {
    fn get_quota(&self, user_id: i64) -> Result<Option<UserQuota>, DbError>;

    fn upsert_quota(&self, quota: &UserQuota) -> Result<UserQuota, DbError>;

    /// Adds `amount` to the stored counter without touching `last_reset`.
    fn increment_quota(&self, user_id: i64, amount: i32) -> Result<(), DbError>;

    fn append_dispatch_record(&self, record: NewDispatchRecord) -> Result<DispatchRecord, DbError>;

    /// Newest first.
    fn list_recent_dispatches(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<DispatchRecord>, DbError>;

    fn create_scheduled_batch(&self, batch: NewScheduledBatch)
        -> Result<ScheduledBatch, DbError>;

    /// Batches still `scheduled` whose time is at or before `now`, oldest first.
    fn list_due_scheduled_batches(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledBatch>, DbError>;

    /// Returns false when the batch was already completed (or does not exist).
    fn mark_batch_completed(&self, batch_id: i32) -> Result<bool, DbError>;

    fn upsert_bot_user(&self, user: NewBotUser) -> Result<(), DbError>;

    fn list_all_bot_user_ids(&self) -> Result<Vec<i64>, DbError>;
}
