use nglbot::i18n::{resolve_language, t};
use nglbot::services::dispatch::ProgressSink;
use nglbot::session::{Action, FlowType, MessageSource, Step};
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, MessageId};

use super::membership::missing_channels;
use super::notify::MessageProgress;
use super::render::{render, Rendered};
use super::{edit_rendered, send_rendered, BotContext};

pub async fn callback_handler(bot: Bot, q: CallbackQuery, ctx: BotContext) -> ResponseResult<()> {
    let data = match &q.data {
        Some(d) => d.clone(),
        None => return Ok(()),
    };
    let message = match &q.message {
        Some(m) => m,
        None => {
            bot.answer_callback_query(&q.id).await?;
            return Ok(());
        }
    };

    let user_id = q.from.id.0 as i64;
    let language = resolve_language(q.from.language_code.as_deref());
    let chat_id = message.chat.id;
    let message_id = message.id;

    let action = if data == "joined" {
        let missing =
            missing_channels(&bot, ctx.notifier.as_ref(), &ctx.required_channels, user_id).await;
        if !missing.is_empty() {
            bot.answer_callback_query(&q.id)
                .text(t(language, "membership.still_missing"))
                .show_alert(true)
                .await?;
            return Ok(());
        }
        Action::BeginSend
    } else {
        match Action::from_callback(&data) {
            Some(action) => action,
            None => {
                tracing::debug!("Unknown callback data from {}: {}", user_id, data);
                bot.answer_callback_query(&q.id).await?;
                return Ok(());
            }
        }
    };

    bot.answer_callback_query(&q.id).await?;

    let session = ctx.conversation.session(user_id);
    let mut progress = None;

    match (&action, &session) {
        (Action::Send, Some(state))
            if state.flow == FlowType::Instant && state.step == Step::AwaitingConfirmation =>
        {
            bot.edit_message_text(chat_id, message_id, t(language, "send.sending"))
                .await?;
            progress = Some(MessageProgress::new(
                bot.clone(),
                chat_id,
                message_id,
                language,
            ));
        }
        (Action::Regenerate, Some(_)) => {
            bot.edit_message_text(chat_id, message_id, t(language, "send.generating"))
                .await?;
        }
        (Action::ChooseCount(_), Some(state))
            if state.step == Step::AwaitingCount && state.source == Some(MessageSource::Ai) =>
        {
            bot.edit_message_text(chat_id, message_id, t(language, "send.generating"))
                .await?;
        }
        _ => {}
    }

    let reply = ctx
        .conversation
        .handle(
            user_id,
            action,
            progress.as_ref().map(|p| p as &dyn ProgressSink),
        )
        .await;

    if let Some(rendered) = render(&reply, language, ctx.conversation.settings()) {
        edit_or_send(&bot, chat_id, message_id, rendered).await;
    }

    Ok(())
}

/// Falls back to a new message when the old one can no longer be edited.
async fn edit_or_send(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    rendered: Rendered,
) {
    let fallback = rendered.clone();

    if let Err(e) = edit_rendered(bot, chat_id, message_id, rendered).await {
        tracing::debug!("Edit failed, sending a new message: {}", e);
        if let Err(e) = send_rendered(bot, chat_id, fallback).await {
            tracing::error!("Failed to answer {}: {}", chat_id, e);
        }
    }
}
