use nglbot::history::render_history;
use nglbot::i18n::{resolve_language, t, t_with_args};
use nglbot::models::NewBotUser;
use nglbot::observability::{Severity, METRICS};
use nglbot::session::{Action, Reply};
use teloxide::macros::BotCommands;
use teloxide::prelude::*;

use super::broadcast::{run_broadcast, BroadcastContent};
use super::keyboards::build_membership_keyboard;
use super::membership::missing_channels;
use super::render::render;
use super::{send_rendered, BotContext};

#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
pub enum Command {
    #[command(description = "Start the bot")]
    Start,
    #[command(description = "Show help information")]
    Help,
    #[command(description = "Send messages to an NGL link")]
    Send,
    #[command(description = "Track your sent messages")]
    Track,
    #[command(description = "Schedule a batch for later (operator only)")]
    Schedule,
    #[command(description = "Send a message to every user (operator only)")]
    Broadcast(String),
    #[command(description = "Show bot statistics (operator only)")]
    Stats,
    #[command(description = "Cancel the current operation")]
    Cancel,
}

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    command: Command,
    ctx: BotContext,
) -> ResponseResult<()> {
    let user = match msg.from() {
        Some(u) => u,
        None => return Ok(()),
    };

    let user_id = user.id.0 as i64;
    let language = resolve_language(user.language_code.as_deref());

    match command {
        Command::Start => handle_start(&bot, &msg, &ctx, language).await?,
        Command::Help => handle_help(&bot, &msg, &ctx, user_id, language).await?,
        Command::Send => {
            if passes_membership(&bot, &ctx, msg.chat.id, user_id, language).await? {
                handle_action(&bot, &msg, &ctx, user_id, Action::BeginSend, language).await?;
            }
        }
        Command::Schedule => {
            handle_action(&bot, &msg, &ctx, user_id, Action::BeginSchedule, language).await?
        }
        Command::Cancel => {
            handle_action(&bot, &msg, &ctx, user_id, Action::Cancel, language).await?
        }
        Command::Track => handle_track(&bot, &msg, &ctx, user_id, language).await?,
        Command::Broadcast(text) => {
            handle_broadcast(&bot, &msg, &ctx, user_id, text, language).await?
        }
        Command::Stats => handle_stats(&bot, &msg, &ctx, user_id, language).await?,
    };

    Ok(())
}

/// Sends the join prompt and returns false when the user still has channels to join.
pub async fn passes_membership(
    bot: &Bot,
    ctx: &BotContext,
    chat_id: ChatId,
    user_id: i64,
    language: &str,
) -> ResponseResult<bool> {
    if ctx.required_channels.is_empty() || ctx.is_operator(user_id) {
        return Ok(true);
    }

    let missing =
        missing_channels(bot, ctx.notifier.as_ref(), &ctx.required_channels, user_id).await;
    if missing.is_empty() {
        return Ok(true);
    }

    bot.send_message(
        chat_id,
        t_with_args(language, "membership.required", &[&missing.join("\n")]),
    )
    .reply_markup(build_membership_keyboard(&missing, language))
    .await?;

    Ok(false)
}

async fn handle_action(
    bot: &Bot,
    msg: &Message,
    ctx: &BotContext,
    user_id: i64,
    action: Action,
    language: &str,
) -> ResponseResult<()> {
    let reply = ctx.conversation.handle(user_id, action, None).await;

    if reply == Reply::Ignored {
        bot.send_message(msg.chat.id, t(language, "common.use_send"))
            .await?;
        return Ok(());
    }

    if let Some(rendered) = render(&reply, language, ctx.conversation.settings()) {
        send_rendered(bot, msg.chat.id, rendered).await?;
    }

    Ok(())
}

async fn handle_start(
    bot: &Bot,
    msg: &Message,
    ctx: &BotContext,
    language: &str,
) -> ResponseResult<()> {
    let user = match msg.from() {
        Some(u) => u,
        None => return Ok(()),
    };
    let user_id = user.id.0 as i64;
    let display_name = user.full_name();

    if let Err(e) = ctx.store.upsert_bot_user(NewBotUser {
        user_id,
        username: user.username.as_deref(),
        display_name: &display_name,
    }) {
        tracing::error!("Failed to save bot user {}: {}", user_id, e);
        ctx.notifier
            .alert(
                Severity::Error,
                "Store",
                &format!("Could not save user {}: {}", user_id, e),
            )
            .await;
    }

    METRICS.increment_user_starts();
    tracing::info!("User {} started the bot", user_id);

    let settings = ctx.conversation.settings();
    bot.send_message(
        msg.chat.id,
        t_with_args(
            language,
            "start.welcome",
            &[
                &settings.per_request_cap.to_string(),
                &settings.daily_quota.to_string(),
            ],
        ),
    )
    .await?;

    if !ctx.is_operator(user_id) {
        let notice = t_with_args(
            language,
            "admin.new_user",
            &[
                &user_id.to_string(),
                user.username.as_deref().unwrap_or("none"),
                &display_name,
            ],
        );
        ctx.notifier.notice(&notice).await;
    }

    Ok(())
}

async fn handle_help(
    bot: &Bot,
    msg: &Message,
    ctx: &BotContext,
    user_id: i64,
    language: &str,
) -> ResponseResult<()> {
    let settings = ctx.conversation.settings();
    let mut text = t_with_args(
        language,
        "start.welcome",
        &[
            &settings.per_request_cap.to_string(),
            &settings.daily_quota.to_string(),
        ],
    );
    if ctx.is_operator(user_id) {
        text.push_str(&t(language, "admin.help"));
    }

    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_track(
    bot: &Bot,
    msg: &Message,
    ctx: &BotContext,
    user_id: i64,
    language: &str,
) -> ResponseResult<()> {
    let text = match ctx.conversation.recent_history(user_id) {
        Ok(records) => render_history(&records, ctx.conversation.settings().timezone, language),
        Err(e) => {
            tracing::error!("Failed to load history for {}: {}", user_id, e);
            METRICS.increment_errors();
            t(language, "errors.generic")
        }
    };

    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_broadcast(
    bot: &Bot,
    msg: &Message,
    ctx: &BotContext,
    user_id: i64,
    text: String,
    language: &str,
) -> ResponseResult<()> {
    if !ctx.is_operator(user_id) {
        bot.send_message(msg.chat.id, t(language, "errors.operator_only"))
            .await?;
        return Ok(());
    }

    let content = match msg.reply_to_message() {
        Some(original) => BroadcastContent::Copy {
            from_chat: original.chat.id,
            message_id: original.id,
        },
        None if !text.trim().is_empty() => BroadcastContent::Text(text.trim().to_string()),
        None => {
            bot.send_message(msg.chat.id, t(language, "broadcast.usage"))
                .await?;
            return Ok(());
        }
    };

    let user_ids = match ctx.store.list_all_bot_user_ids() {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!("Failed to list users for broadcast: {}", e);
            METRICS.increment_errors();
            bot.send_message(msg.chat.id, t(language, "errors.generic"))
                .await?;
            return Ok(());
        }
    };

    bot.send_message(
        msg.chat.id,
        t_with_args(language, "broadcast.started", &[&user_ids.len().to_string()]),
    )
    .await?;

    tokio::spawn(run_broadcast(
        bot.clone(),
        user_ids,
        content,
        ctx.broadcast_rate,
        msg.chat.id,
        language.to_string(),
    ));

    Ok(())
}

fn format_uptime(secs: u64) -> String {
    format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
}

async fn handle_stats(
    bot: &Bot,
    msg: &Message,
    ctx: &BotContext,
    user_id: i64,
    language: &str,
) -> ResponseResult<()> {
    if !ctx.is_operator(user_id) {
        bot.send_message(msg.chat.id, t(language, "errors.operator_only"))
            .await?;
        return Ok(());
    }

    let known_users = match ctx.store.list_all_bot_user_ids() {
        Ok(ids) => ids.len().to_string(),
        Err(e) => {
            tracing::warn!("Failed to count users: {}", e);
            "?".to_string()
        }
    };

    let snapshot = METRICS.snapshot();
    let text = t_with_args(
        language,
        "stats.summary",
        &[
            &format_uptime(snapshot.uptime_secs),
            &snapshot.messages_delivered.to_string(),
            &snapshot.messages_failed.to_string(),
            &snapshot.batches_dispatched.to_string(),
            &snapshot.batches_scheduled.to_string(),
            &snapshot.scheduled_batches_completed.to_string(),
            &snapshot.quota_refusals.to_string(),
            &snapshot.user_starts.to_string(),
            &known_users,
        ],
    );

    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::utils::command::BotCommands;

    #[test]
    fn test_uptime_format() {
        assert_eq!(format_uptime(0), "0h 0m");
        assert_eq!(format_uptime(3 * 3600 + 25 * 60 + 59), "3h 25m");
    }

    #[test]
    fn test_commands_parse() {
        assert!(matches!(
            Command::parse("/send", "nglbot"),
            Ok(Command::Send)
        ));
        match Command::parse("/broadcast hello all", "nglbot") {
            Ok(Command::Broadcast(text)) => assert_eq!(text, "hello all"),
            _ => panic!("broadcast text not parsed"),
        }
    }
}
