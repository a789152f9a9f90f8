use async_trait::async_trait;
use nglbot::i18n::{t_with_args, DEFAULT_LANGUAGE};
use nglbot::models::ScheduledBatch;
use nglbot::services::dispatch::{DispatchOutcome, ProgressSink};
use nglbot::services::scheduler::BatchObserver;
use teloxide::prelude::*;
use teloxide::types::MessageId;

/// Edits one status message as a batch goes out.
pub struct MessageProgress {
    bot: Bot,
    chat_id: ChatId,
    message_id: MessageId,
    language: String,
}

impl MessageProgress {
    pub fn new(bot: Bot, chat_id: ChatId, message_id: MessageId, language: &str) -> Self {
        Self {
            bot,
            chat_id,
            message_id,
            language: language.to_string(),
        }
    }
}

#[async_trait]
impl ProgressSink for MessageProgress {
    async fn report(&self, attempted: usize, total: usize) {
        let text = t_with_args(
            &self.language,
            "send.progress",
            &[&attempted.to_string(), &total.to_string()],
        );
        if let Err(e) = self
            .bot
            .edit_message_text(self.chat_id, self.message_id, text)
            .await
        {
            tracing::debug!("Progress update failed: {}", e);
        }
    }
}

/// Tells the owner of a scheduled batch how it went.
pub struct ChatBatchObserver {
    bot: Bot,
}

impl ChatBatchObserver {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl BatchObserver for ChatBatchObserver {
    async fn batch_completed(&self, batch: &ScheduledBatch, outcome: DispatchOutcome) {
        let text = t_with_args(
            DEFAULT_LANGUAGE,
            "schedule.completed",
            &[
                &batch.id.to_string(),
                &batch.endpoint_link,
                &outcome.success_count.to_string(),
                &outcome.failed_count.to_string(),
            ],
        );

        if let Err(e) = self.bot.send_message(ChatId(batch.user_id), text).await {
            tracing::warn!(
                "Could not tell user {} about batch {}: {}",
                batch.user_id,
                batch.id,
                e
            );
        }
    }
}
