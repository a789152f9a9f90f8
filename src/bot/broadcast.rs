use std::future::Future;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::MessageId;
use tokio::time::Instant;

use nglbot::i18n::t_with_args;
use nglbot::observability::METRICS;

const PROGRESS_LOG_INTERVAL: usize = 100;

/// Spaces out calls to at most `rate_per_second`.
pub struct RateLimiter {
    interval: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    pub fn new(rate_per_second: u32) -> Self {
        let interval = if rate_per_second > 0 {
            Duration::from_millis(1000 / rate_per_second as u64)
        } else {
            Duration::from_millis(100)
        };

        Self {
            interval,
            last_request: None,
        }
    }

    #[cfg(test)]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn acquire(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

#[derive(Debug, Clone)]
pub enum BroadcastContent {
    /// Copy of an existing message, keeping media and formatting.
    Copy {
        from_chat: ChatId,
        message_id: MessageId,
    },
    Text(String),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Calls `send` once per user, paced by `limiter`.
pub async fn deliver_all<F, Fut>(
    user_ids: &[i64],
    limiter: &mut RateLimiter,
    mut send: F,
) -> BroadcastReport
where
    F: FnMut(i64) -> Fut,
    Fut: Future<Output = bool>,
{
    let mut report = BroadcastReport::default();

    for (idx, &user_id) in user_ids.iter().enumerate() {
        limiter.acquire().await;

        if send(user_id).await {
            report.delivered += 1;
        } else {
            report.failed += 1;
        }

        if (idx + 1) % PROGRESS_LOG_INTERVAL == 0 {
            tracing::info!(
                "Broadcast progress: {}/{} ({} failed)",
                idx + 1,
                user_ids.len(),
                report.failed
            );
        }
    }

    report
}

async fn send_content(bot: &Bot, user_id: i64, content: &BroadcastContent) -> bool {
    let result = match content {
        BroadcastContent::Copy {
            from_chat,
            message_id,
        } => bot
            .copy_message(ChatId(user_id), *from_chat, *message_id)
            .await
            .map(|_| ()),
        BroadcastContent::Text(text) => bot
            .send_message(ChatId(user_id), text)
            .await
            .map(|_| ()),
    };

    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("Broadcast to {} failed: {}", user_id, e);
            false
        }
    }
}

/// Sends `content` to every user and reports the tally back to `report_chat`.
pub async fn run_broadcast(
    bot: Bot,
    user_ids: Vec<i64>,
    content: BroadcastContent,
    rate_per_second: u32,
    report_chat: ChatId,
    language: String,
) {
    tracing::info!(
        "Broadcast started to {} users at {} msg/sec",
        user_ids.len(),
        rate_per_second
    );

    let mut limiter = RateLimiter::new(rate_per_second);
    let report = deliver_all(&user_ids, &mut limiter, |user_id| {
        let bot = bot.clone();
        let content = content.clone();
        async move { send_content(&bot, user_id, &content).await }
    })
    .await;

    METRICS.add_broadcast_deliveries(report.delivered as u64);
    tracing::info!(
        "Broadcast finished: {} delivered, {} failed",
        report.delivered,
        report.failed
    );

    let summary = t_with_args(
        &language,
        "broadcast.finished",
        &[&report.delivered.to_string(), &report.failed.to_string()],
    );
    if let Err(e) = bot.send_message(report_chat, summary).await {
        tracing::error!("Failed to report broadcast result: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_from_rate() {
        assert_eq!(RateLimiter::new(25).interval(), Duration::from_millis(40));
        assert_eq!(RateLimiter::new(0).interval(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_acquire_spaces_requests() {
        let mut limiter = RateLimiter::new(10);
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_deliver_all_tallies_results() {
        let mut limiter = RateLimiter::new(100);
        let ids = vec![1, 2, 3, 4, 5];

        let report = deliver_all(&ids, &mut limiter, |id| async move { id % 2 == 1 }).await;

        assert_eq!(
            report,
            BroadcastReport {
                delivered: 3,
                failed: 2
            }
        );
    }
}
