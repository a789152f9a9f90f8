use crate::schema::{bot_users, dispatch_records, scheduled_batches, user_quotas};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Success,
    Failed,
}

impl DispatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStatus::Success => "success",
            DispatchStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<DispatchStatus> {
        match s {
            "success" => Some(DispatchStatus::Success),
            "failed" => Some(DispatchStatus::Failed),
            _ => None,
        }
    }

    pub fn from_delivered(delivered: bool) -> Self {
        if delivered {
            DispatchStatus::Success
        } else {
            DispatchStatus::Failed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Scheduled,
    Completed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Scheduled => "scheduled",
            BatchStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<BatchStatus> {
        match s {
            "scheduled" => Some(BatchStatus::Scheduled),
            "completed" => Some(BatchStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = user_quotas)]
#[diesel(primary_key(user_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserQuota {
    pub user_id: i64,
    pub message_count: i32,
    pub last_reset: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = dispatch_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DispatchRecord {
    pub id: i32,
    pub user_id: i64,
    pub endpoint_link: String,
    pub message_text: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl DispatchRecord {
    pub fn status_enum(&self) -> Option<DispatchStatus> {
        DispatchStatus::parse(&self.status)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = dispatch_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewDispatchRecord<'a> {
    pub user_id: i64,
    pub endpoint_link: &'a str,
    pub message_text: &'a str,
    pub status: &'a str,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = scheduled_batches)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ScheduledBatch {
    pub id: i32,
    pub user_id: i64,
    pub endpoint_link: String,
    pub messages: Vec<String>,
    pub scheduled_time: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScheduledBatch {
    pub fn status_enum(&self) -> Option<BatchStatus> {
        BatchStatus::parse(&self.status)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = scheduled_batches)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewScheduledBatch<'a> {
    pub user_id: i64,
    pub endpoint_link: &'a str,
    pub messages: &'a [String],
    pub scheduled_time: DateTime<Utc>,
    pub status: &'a str,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = bot_users)]
#[diesel(primary_key(user_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BotUser {
    pub user_id: i64,
    pub username: Option<String>,
    pub display_name: String,
    pub joined_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = bot_users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewBotUser<'a> {
    pub user_id: i64,
    pub username: Option<&'a str>,
    pub display_name: &'a str,
}
