use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::DispatchStore;
use crate::db::DbError;
use crate::models::{
    BatchStatus, BotUser, DispatchRecord, NewBotUser, NewDispatchRecord, NewScheduledBatch,
    ScheduledBatch, UserQuota,
};

#[derive(Default)]
struct Tables {
    quotas: HashMap<i64, UserQuota>,
    records: Vec<DispatchRecord>,
    batches: Vec<ScheduledBatch>,
    users: HashMap<i64, BotUser>,
}

/// In-memory store used by the engine tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call fails as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<DispatchRecord> {
        self.tables.lock().unwrap().records.clone()
    }

    pub fn batches(&self) -> Vec<ScheduledBatch> {
        self.tables.lock().unwrap().batches.clone()
    }

    pub fn quota(&self, user_id: i64) -> Option<UserQuota> {
        self.tables.lock().unwrap().quotas.get(&user_id).cloned()
    }

    pub fn bot_user(&self, user_id: i64) -> Option<BotUser> {
        self.tables.lock().unwrap().users.get(&user_id).cloned()
    }

    fn check(&self) -> Result<(), DbError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(DbError::DieselError(diesel::result::Error::BrokenTransactionManager))
        } else {
            Ok(())
        }
    }
}

impl DispatchStore for MemoryStore {
    fn get_quota(&self, user_id: i64) -> Result<Option<UserQuota>, DbError> {
        self.check()?;
        Ok(self.tables.lock().unwrap().quotas.get(&user_id).cloned())
    }

    fn upsert_quota(&self, quota: &UserQuota) -> Result<UserQuota, DbError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        tables.quotas.insert(quota.user_id, quota.clone());
        Ok(quota.clone())
    }

    fn increment_quota(&self, user_id: i64, amount: i32) -> Result<(), DbError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        match tables.quotas.get_mut(&user_id) {
            Some(quota) => {
                quota.message_count += amount;
                Ok(())
            }
            None => Err(DbError::DieselError(diesel::result::Error::NotFound)),
        }
    }

    fn append_dispatch_record(&self, record: NewDispatchRecord) -> Result<DispatchRecord, DbError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let stored = DispatchRecord {
            id: tables.records.len() as i32 + 1,
            user_id: record.user_id,
            endpoint_link: record.endpoint_link.to_string(),
            message_text: record.message_text.to_string(),
            status: record.status.to_string(),
            created_at: Utc::now(),
        };
        tables.records.push(stored.clone());
        Ok(stored)
    }

    fn list_recent_dispatches(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<DispatchRecord>, DbError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .records
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    fn create_scheduled_batch(
        &self,
        batch: NewScheduledBatch,
    ) -> Result<ScheduledBatch, DbError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let stored = ScheduledBatch {
            id: tables.batches.len() as i32 + 1,
            user_id: batch.user_id,
            endpoint_link: batch.endpoint_link.to_string(),
            messages: batch.messages.to_vec(),
            scheduled_time: batch.scheduled_time,
            status: batch.status.to_string(),
            created_at: Utc::now(),
            completed_at: None,
        };
        tables.batches.push(stored.clone());
        Ok(stored)
    }

    fn list_due_scheduled_batches(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledBatch>, DbError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        let mut due: Vec<ScheduledBatch> = tables
            .batches
            .iter()
            .filter(|b| b.status == BatchStatus::Scheduled.as_str() && b.scheduled_time <= now)
            .cloned()
            .collect();
        due.sort_by_key(|b| (b.scheduled_time, b.id));
        Ok(due)
    }

    fn mark_batch_completed(&self, batch_id: i32) -> Result<bool, DbError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        match tables
            .batches
            .iter_mut()
            .find(|b| b.id == batch_id && b.status == BatchStatus::Scheduled.as_str())
        {
            Some(batch) => {
                batch.status = BatchStatus::Completed.as_str().to_string();
                batch.completed_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn upsert_bot_user(&self, user: NewBotUser) -> Result<(), DbError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let now = Utc::now();
        let joined_at = tables
            .users
            .get(&user.user_id)
            .map(|u| u.joined_at)
            .unwrap_or(now);
        tables.users.insert(
            user.user_id,
            BotUser {
                user_id: user.user_id,
                username: user.username.map(str::to_string),
                display_name: user.display_name.to_string(),
                joined_at,
                updated_at: now,
            },
        );
        Ok(())
    }

    fn list_all_bot_user_ids(&self) -> Result<Vec<i64>, DbError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        let mut ids: Vec<i64> = tables.users.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_user_upsert_keeps_newest_profile() {
        let store = MemoryStore::new();

        store
            .upsert_bot_user(NewBotUser {
                user_id: 5,
                username: Some("old"),
                display_name: "Old",
            })
            .unwrap();
        let first = store.bot_user(5).unwrap();

        store
            .upsert_bot_user(NewBotUser {
                user_id: 5,
                username: Some("new"),
                display_name: "New",
            })
            .unwrap();
        let second = store.bot_user(5).unwrap();

        assert_eq!(second.username.as_deref(), Some("new"));
        assert_eq!(second.display_name, "New");
        assert_eq!(second.joined_at, first.joined_at);
        assert_eq!(store.list_all_bot_user_ids().unwrap(), vec![5]);
    }

    #[test]
    fn test_bot_user_roster_is_sorted() {
        let store = MemoryStore::new();
        for id in [9, 3, 7] {
            store
                .upsert_bot_user(NewBotUser {
                    user_id: id,
                    username: None,
                    display_name: "someone",
                })
                .unwrap();
        }
        assert_eq!(store.list_all_bot_user_ids().unwrap(), vec![3, 7, 9]);
    }
}
