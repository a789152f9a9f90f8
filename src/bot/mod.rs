use std::sync::Arc;

use nglbot::observability::OperatorNotifier;
use nglbot::session::Conversation;
use nglbot::store::DispatchStore;
use teloxide::dispatching::{Dispatcher, UpdateFilterExt};
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, MessageId};

pub mod broadcast;
mod callbacks;
mod commands;
mod errors;
mod inputs;
pub mod keyboards;
pub mod membership;
pub mod notify;
pub mod render;

use callbacks::callback_handler;
use commands::{command_handler, Command};
use errors::OperatorErrorHandler;
use inputs::message_handler;
use render::Rendered;

/// Everything a handler needs, cloned into each dptree endpoint.
#[derive(Clone)]
pub struct BotContext {
    pub conversation: Arc<Conversation>,
    pub store: Arc<dyn DispatchStore>,
    pub notifier: Arc<dyn OperatorNotifier>,
    pub required_channels: Arc<Vec<String>>,
    pub broadcast_rate: u32,
}

impl BotContext {
    pub fn is_operator(&self, user_id: i64) -> bool {
        self.conversation.settings().is_operator(user_id)
    }
}

pub async fn send_rendered(bot: &Bot, chat_id: ChatId, rendered: Rendered) -> ResponseResult<()> {
    let mut request = bot.send_message(chat_id, rendered.text);
    if let Some(keyboard) = rendered.keyboard {
        request = request.reply_markup(keyboard);
    }
    request.await?;
    Ok(())
}

pub async fn edit_rendered(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    rendered: Rendered,
) -> ResponseResult<()> {
    let mut request = bot.edit_message_text(chat_id, message_id, rendered.text);
    if let Some(keyboard) = rendered.keyboard {
        request = request.reply_markup(keyboard);
    }
    request.await?;
    Ok(())
}

pub async fn run_bot(bot: Bot, ctx: BotContext) {
    tracing::info!("Starting NGL bot...");

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint({
                    let ctx = ctx.clone();
                    move |bot: Bot, msg: Message, cmd: Command| {
                        let ctx = ctx.clone();
                        async move { command_handler(bot, msg, cmd, ctx).await }
                    }
                }),
        )
        .branch(Update::filter_message().endpoint({
            let ctx = ctx.clone();
            move |bot: Bot, msg: Message| {
                let ctx = ctx.clone();
                async move { message_handler(bot, msg, ctx).await }
            }
        }))
        .branch(Update::filter_callback_query().endpoint({
            let ctx = ctx.clone();
            move |bot: Bot, q: CallbackQuery| {
                let ctx = ctx.clone();
                async move { callback_handler(bot, q, ctx).await }
            }
        }));

    Dispatcher::builder(bot, handler)
        .error_handler(OperatorErrorHandler::new(ctx.notifier.clone()))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
