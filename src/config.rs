use chrono_tz::Tz;
use nglbot::link::DEFAULT_LINK_PREFIX;
use nglbot::services::gemini::DEFAULT_GEMINI_API_URL;
use nglbot::settings::EngineSettings;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bot_token: String,
    pub database_url: String,
    pub admin_id: i64,
    pub gemini_api_key: Option<String>,
    pub gemini_api_url: String,
    pub port: u16,
    pub timezone: Tz,
    pub link_prefix: String,
    pub required_channels: Vec<String>,
    pub operator_alerts: String,
    pub daily_quota: u32,
    pub per_request_cap: u32,
    pub max_free_form_count: u32,
    pub schedule_operator_only: bool,
    pub pacing_min_secs: u64,
    pub pacing_max_secs: u64,
    pub scheduler_interval_secs: u64,
    pub broadcast_rate: u32,
}

#[derive(Debug)]
pub struct ConfigError {
    pub missing_vars: Vec<String>,
    pub invalid_vars: Vec<(String, String)>,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.missing_vars.is_empty() {
            writeln!(f, "Missing required environment variables:")?;
            for var in &self.missing_vars {
                writeln!(f, "  - {}", var)?;
            }
        }
        if !self.invalid_vars.is_empty() {
            writeln!(f, "Invalid environment variables:")?;
            for (var, err) in &self.invalid_vars {
                writeln!(f, "  - {}: {}", var, err)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ConfigError {}

fn get_required(name: &str, missing: &mut Vec<String>) -> Option<String> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => Some(v),
        _ => {
            missing.push(name.to_string());
            None
        }
    }
}

fn get_optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Parses an optional variable, recording a bad value and falling back to `default`.
fn get_parsed<T>(name: &str, default: T, invalid: &mut Vec<(String, String)>) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_optional(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| {
                invalid.push((name.to_string(), e.to_string()));
            })
            .unwrap_or(default),
        None => default,
    }
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("expected true/false, got {:?}", other)),
    }
}

/// Splits `@channel_a, @channel_b` into channel handles, adding a missing `@`.
pub fn parse_channels(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| {
            if c.starts_with('@') || c.starts_with('-') {
                c.to_string()
            } else {
                format!("@{}", c)
            }
        })
        .collect()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let mut invalid = Vec::new();

        let bot_token = get_required("BOT_TOKEN", &mut missing);
        let database_url = get_required("DATABASE_URL", &mut missing);
        let admin_id_str = get_required("ADMIN_ID", &mut missing);

        let admin_id = admin_id_str
            .as_ref()
            .and_then(|s| {
                s.parse::<i64>()
                    .map_err(|e| {
                        invalid.push(("ADMIN_ID".into(), e.to_string()));
                    })
                    .ok()
            })
            .unwrap_or(0);

        let timezone = get_optional("TIMEZONE")
            .and_then(|raw| {
                raw.parse::<Tz>()
                    .map_err(|e| {
                        invalid.push(("TIMEZONE".into(), e.to_string()));
                    })
                    .ok()
            })
            .unwrap_or(chrono_tz::Asia::Kolkata);

        let schedule_operator_only = match get_optional("SCHEDULE_OPERATOR_ONLY") {
            Some(raw) => parse_bool(&raw).unwrap_or_else(|e| {
                invalid.push(("SCHEDULE_OPERATOR_ONLY".into(), e));
                true
            }),
            None => true,
        };

        let port = get_parsed("PORT", 8080u16, &mut invalid);
        let daily_quota = get_parsed("DAILY_QUOTA", 8u32, &mut invalid);
        let per_request_cap = get_parsed("PER_REQUEST_CAP", 4u32, &mut invalid);
        let max_free_form_count = get_parsed("MAX_FREE_FORM_COUNT", 200u32, &mut invalid);
        let pacing_min_secs = get_parsed("PACING_MIN_SECS", 2u64, &mut invalid);
        let pacing_max_secs = get_parsed("PACING_MAX_SECS", 5u64, &mut invalid);
        let scheduler_interval_secs = get_parsed("SCHEDULER_INTERVAL_SECS", 60u64, &mut invalid);
        let broadcast_rate = get_parsed("BROADCAST_RATE", 25u32, &mut invalid);

        if pacing_min_secs > pacing_max_secs {
            invalid.push((
                "PACING_MIN_SECS".into(),
                format!("must not exceed PACING_MAX_SECS ({})", pacing_max_secs),
            ));
        }
        if scheduler_interval_secs == 0 {
            invalid.push(("SCHEDULER_INTERVAL_SECS".into(), "must be positive".into()));
        }

        if !missing.is_empty() || !invalid.is_empty() {
            return Err(ConfigError {
                missing_vars: missing,
                invalid_vars: invalid,
            });
        }

        Ok(Self {
            bot_token: bot_token.unwrap_or_default(),
            database_url: database_url.unwrap_or_default(),
            admin_id,
            gemini_api_key: get_optional("GEMINI_API_KEY"),
            gemini_api_url: get_optional("GEMINI_API_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_API_URL.to_string()),
            port,
            timezone,
            link_prefix: get_optional("LINK_PREFIX")
                .unwrap_or_else(|| DEFAULT_LINK_PREFIX.to_string()),
            required_channels: get_optional("REQUIRED_CHANNELS")
                .map(|raw| parse_channels(&raw))
                .unwrap_or_default(),
            operator_alerts: get_optional("OPERATOR_ALERTS").unwrap_or_else(|| "ACTIVE".into()),
            daily_quota,
            per_request_cap,
            max_free_form_count,
            schedule_operator_only,
            pacing_min_secs,
            pacing_max_secs,
            scheduler_interval_secs,
            broadcast_rate,
        })
    }

    pub fn is_operator_alerts_active(&self) -> bool {
        self.operator_alerts == "ACTIVE"
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            operator_id: self.admin_id,
            daily_quota: self.daily_quota,
            quota_window: chrono::Duration::hours(24),
            per_request_cap: self.per_request_cap,
            max_free_form_count: self.max_free_form_count,
            schedule_operator_only: self.schedule_operator_only,
            link_prefix: self.link_prefix.clone(),
            timezone: self.timezone,
            pacing_min: Duration::from_secs(self.pacing_min_secs),
            pacing_max: Duration::from_secs(self.pacing_max_secs),
            scheduler_interval: Duration::from_secs(self.scheduler_interval_secs),
            ..EngineSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channels() {
        assert_eq!(
            parse_channels("@news, updates ,,-1001234"),
            vec!["@news", "@updates", "-1001234"]
        );
        assert!(parse_channels("  ").is_empty());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Ok(true));
        assert_eq!(parse_bool("off"), Ok(false));
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn test_config_error_lists_everything() {
        let err = ConfigError {
            missing_vars: vec!["BOT_TOKEN".into()],
            invalid_vars: vec![("PORT".into(), "invalid digit found in string".into())],
        };
        let text = err.to_string();
        assert!(text.contains("  - BOT_TOKEN"));
        assert!(text.contains("  - PORT: invalid digit"));
    }
}
