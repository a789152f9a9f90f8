use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;

pub mod db;
pub mod history;
pub mod i18n;
pub mod link;
pub mod models;
pub mod observability;
pub mod schema;
pub mod services;
pub mod settings;
pub mod session;
pub mod store;

use self::models::*;
use db::{DbError, DbPool};
use store::DispatchStore;

/// Postgres-backed [`DispatchStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl DispatchStore for PgStore {
    fn get_quota(&self, quota_user_id: i64) -> Result<Option<UserQuota>, DbError> {
        use self::schema::user_quotas;

        let conn = &mut self.pool.get()?;

        Ok(user_quotas::table
            .find(quota_user_id)
            .first::<UserQuota>(conn)
            .optional()?)
    }

    fn upsert_quota(&self, quota: &UserQuota) -> Result<UserQuota, DbError> {
        use self::schema::user_quotas;

        let conn = &mut self.pool.get()?;

        Ok(diesel::insert_into(user_quotas::table)
            .values(quota)
            .on_conflict(user_quotas::user_id)
            .do_update()
            .set(quota)
            .get_result(conn)?)
    }

    fn increment_quota(&self, quota_user_id: i64, amount: i32) -> Result<(), DbError> {
        use self::schema::user_quotas;

        let conn = &mut self.pool.get()?;

        let updated = diesel::update(user_quotas::table.find(quota_user_id))
            .set(user_quotas::message_count.eq(user_quotas::message_count + amount))
            .execute(conn)?;

        if updated == 0 {
            return Err(DbError::DieselError(diesel::result::Error::NotFound));
        }

        Ok(())
    }

    fn append_dispatch_record(&self, record: NewDispatchRecord) -> Result<DispatchRecord, DbError> {
        use self::schema::dispatch_records;

        let conn = &mut self.pool.get()?;

        Ok(diesel::insert_into(dispatch_records::table)
            .values(&record)
            .get_result(conn)?)
    }

    fn list_recent_dispatches(
        &self,
        record_user_id: i64,
        limit: i64,
    ) -> Result<Vec<DispatchRecord>, DbError> {
        use self::schema::dispatch_records;

        let conn = &mut self.pool.get()?;

        Ok(dispatch_records::table
            .filter(dispatch_records::user_id.eq(record_user_id))
            .order((
                dispatch_records::created_at.desc(),
                dispatch_records::id.desc(),
            ))
            .limit(limit)
            .load::<DispatchRecord>(conn)?)
    }

    fn create_scheduled_batch(
        &self,
        batch: NewScheduledBatch,
    ) -> Result<ScheduledBatch, DbError> {
        use self::schema::scheduled_batches;

        let conn = &mut self.pool.get()?;

        Ok(diesel::insert_into(scheduled_batches::table)
            .values(&batch)
            .get_result(conn)?)
    }

    fn list_due_scheduled_batches(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledBatch>, DbError> {
        use self::schema::scheduled_batches;

        let conn = &mut self.pool.get()?;

        Ok(scheduled_batches::table
            .filter(scheduled_batches::status.eq(BatchStatus::Scheduled.as_str()))
            .filter(scheduled_batches::scheduled_time.le(now))
            .order((
                scheduled_batches::scheduled_time.asc(),
                scheduled_batches::id.asc(),
            ))
            .load::<ScheduledBatch>(conn)?)
    }

    fn mark_batch_completed(&self, batch_id: i32) -> Result<bool, DbError> {
        use self::schema::scheduled_batches;

        let conn = &mut self.pool.get()?;

        let updated = diesel::update(
            scheduled_batches::table
                .filter(scheduled_batches::id.eq(batch_id))
                .filter(scheduled_batches::status.eq(BatchStatus::Scheduled.as_str())),
        )
        .set((
            scheduled_batches::status.eq(BatchStatus::Completed.as_str()),
            scheduled_batches::completed_at.eq(Some(Utc::now())),
        ))
        .execute(conn)?;

        Ok(updated > 0)
    }

    fn upsert_bot_user(&self, user: NewBotUser) -> Result<(), DbError> {
        use self::schema::bot_users;

        let conn = &mut self.pool.get()?;

        diesel::insert_into(bot_users::table)
            .values(&user)
            .on_conflict(bot_users::user_id)
            .do_update()
            .set((
                bot_users::username.eq(excluded(bot_users::username)),
                bot_users::display_name.eq(excluded(bot_users::display_name)),
                bot_users::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;

        Ok(())
    }

    fn list_all_bot_user_ids(&self) -> Result<Vec<i64>, DbError> {
        use self::schema::bot_users;

        let conn = &mut self.pool.get()?;

        Ok(bot_users::table
            .select(bot_users::user_id)
            .order(bot_users::user_id.asc())
            .load::<i64>(conn)?)
    }
}
