use nglbot::i18n::{resolve_language, t};
use nglbot::session::{Action, Reply};
use teloxide::prelude::*;

use super::render::render;
use super::{send_rendered, BotContext};

pub async fn message_handler(bot: Bot, msg: Message, ctx: BotContext) -> ResponseResult<()> {
    let user = match msg.from() {
        Some(u) => u,
        None => return Ok(()),
    };

    if !msg.chat.is_private() {
        return Ok(());
    }

    let text = match msg.text() {
        Some(t) => t.to_string(),
        None => return Ok(()),
    };

    let user_id = user.id.0 as i64;
    let language = resolve_language(user.language_code.as_deref());

    let reply = ctx
        .conversation
        .handle(user_id, Action::Text(text), None)
        .await;

    if reply == Reply::Ignored {
        bot.send_message(msg.chat.id, t(language, "common.use_send"))
            .await?;
        return Ok(());
    }

    if let Some(rendered) = render(&reply, language, ctx.conversation.settings()) {
        send_rendered(&bot, msg.chat.id, rendered).await?;
    }

    Ok(())
}
