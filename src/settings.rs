use chrono_tz::Tz;
use std::time::Duration;

use crate::link::DEFAULT_LINK_PREFIX;

/// Tunables of the dispatch engine, built from the process configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub operator_id: i64,
    /// Messages a non-operator may send per quota window.
    pub daily_quota: u32,
    pub quota_window: chrono::Duration,
    /// Largest value offered on the fixed count menu.
    pub per_request_cap: u32,
    /// Upper bound for counts typed as free-form numbers.
    pub max_free_form_count: u32,
    pub schedule_operator_only: bool,
    pub link_prefix: String,
    pub timezone: Tz,
    pub pacing_min: Duration,
    pub pacing_max: Duration,
    pub scheduler_interval: Duration,
    pub history_limit: i64,
}

impl EngineSettings {
    pub fn is_operator(&self, user_id: i64) -> bool {
        user_id == self.operator_id
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            operator_id: 0,
            daily_quota: 8,
            quota_window: chrono::Duration::hours(24),
            per_request_cap: 4,
            max_free_form_count: 200,
            schedule_operator_only: true,
            link_prefix: DEFAULT_LINK_PREFIX.to_string(),
            timezone: chrono_tz::Asia::Kolkata,
            pacing_min: Duration::from_secs(2),
            pacing_max: Duration::from_secs(5),
            scheduler_interval: Duration::from_secs(60),
            history_limit: 10,
        }
    }
}
