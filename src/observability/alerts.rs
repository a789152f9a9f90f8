use async_trait::async_trait;
use html_escape::encode_text;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use teloxide::prelude::*;
use teloxide::types::ParseMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Critical => "🚨",
            Severity::Error => "❌",
            Severity::Warning => "⚠️",
            Severity::Info => "ℹ️",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

/// Out-of-band channel to the operator.
#[async_trait]
pub trait OperatorNotifier: Send + Sync {
    /// Rate-limited problem report.
    async fn alert(&self, severity: Severity, category: &str, message: &str);

    /// Plain informational notice, always delivered.
    async fn notice(&self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub severity: Severity,
    pub category: String,
}

pub struct AlertManager {
    bot: Bot,
    operator_chat_id: i64,
    alerts_enabled: bool,
    rate_limit: Duration,
    last_alerts: Mutex<HashMap<AlertKey, Instant>>,
}

impl AlertManager {
    pub fn new(bot: Bot, operator_chat_id: i64, alerts_enabled: bool) -> Self {
        Self::with_rate_limit(bot, operator_chat_id, alerts_enabled, Duration::from_secs(60))
    }

    pub fn with_rate_limit(
        bot: Bot,
        operator_chat_id: i64,
        alerts_enabled: bool,
        rate_limit: Duration,
    ) -> Self {
        Self {
            bot,
            operator_chat_id,
            alerts_enabled,
            rate_limit,
            last_alerts: Mutex::new(HashMap::new()),
        }
    }

    pub fn should_alert(&self, severity: Severity, category: &str) -> bool {
        let key = AlertKey {
            severity,
            category: category.to_string(),
        };

        let mut last_alerts = match self.last_alerts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("AlertManager mutex poisoned, recovering");
                poisoned.into_inner()
            }
        };
        let now = Instant::now();

        if let Some(last_time) = last_alerts.get(&key) {
            if now.duration_since(*last_time) < self.rate_limit {
                return false;
            }
        }

        last_alerts.insert(key, now);
        true
    }

    pub fn format_alert(&self, severity: Severity, category: &str, message: &str) -> String {
        format!(
            "{} <b>[{}]</b> {}\n{}",
            severity.emoji(),
            severity.label(),
            category,
            encode_text(message)
        )
    }
}

#[async_trait]
impl OperatorNotifier for AlertManager {
    async fn alert(&self, severity: Severity, category: &str, message: &str) {
        if !self.alerts_enabled {
            return;
        }

        if !self.should_alert(severity, category) {
            tracing::debug!("Alert rate-limited: {} - {}", category, message);
            return;
        }

        let formatted = self.format_alert(severity, category, message);

        if let Err(e) = self
            .bot
            .send_message(ChatId(self.operator_chat_id), &formatted)
            .parse_mode(ParseMode::Html)
            .await
        {
            tracing::error!("Failed to send alert: {}", e);
        }
    }

    async fn notice(&self, message: &str) {
        if let Err(e) = self
            .bot
            .send_message(ChatId(self.operator_chat_id), message)
            .await
        {
            tracing::error!("Failed to notify operator: {}", e);
        }
    }
}

#[cfg(test)]
pub struct RecordingNotifier {
    pub alerts: Mutex<Vec<(Severity, String)>>,
    pub notices: Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            alerts: Mutex::new(Vec::new()),
            notices: Mutex::new(Vec::new()),
        }
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl OperatorNotifier for RecordingNotifier {
    async fn alert(&self, severity: Severity, category: &str, _message: &str) {
        self.alerts
            .lock()
            .unwrap()
            .push((severity, category.to_string()));
    }

    async fn notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}
