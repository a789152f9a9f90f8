use nglbot::i18n::{t, t_with_args};
use nglbot::services::generation::Language;
use nglbot::session::{FlowType, MessageSource};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use super::membership::channel_url;

const COUNT_BUTTONS_PER_ROW: usize = 4;

fn cancel_row(language: &str) -> Vec<InlineKeyboardButton> {
    vec![InlineKeyboardButton::callback(
        t(language, "buttons.cancel"),
        "cancel",
    )]
}

pub fn build_cancel_keyboard(language: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![cancel_row(language)])
}

pub fn build_source_keyboard(language: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            t(language, "buttons.ai"),
            "src:ai",
        )],
        vec![InlineKeyboardButton::callback(
            t(language, "buttons.custom"),
            "src:custom",
        )],
        cancel_row(language),
    ])
}

pub fn build_language_keyboard(language: &str) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Language::all()
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|l| {
                    InlineKeyboardButton::callback(
                        l.display_name(),
                        format!("lang:{}", l.as_str()),
                    )
                })
                .collect()
        })
        .collect();
    rows.push(cancel_row(language));
    InlineKeyboardMarkup::new(rows)
}

pub fn build_count_keyboard(max: u32, language: &str) -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = (1..=max)
        .map(|n| {
            InlineKeyboardButton::callback(
                t_with_args(language, "buttons.count", &[&n.to_string()]),
                format!("count:{}", n),
            )
        })
        .collect();

    let mut rows: Vec<Vec<InlineKeyboardButton>> = buttons
        .chunks(COUNT_BUTTONS_PER_ROW)
        .map(|row| row.to_vec())
        .collect();
    rows.push(cancel_row(language));
    InlineKeyboardMarkup::new(rows)
}

pub fn build_review_keyboard(
    flow: FlowType,
    source: MessageSource,
    language: &str,
) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();

    if source == MessageSource::Ai {
        rows.push(vec![InlineKeyboardButton::callback(
            t(language, "buttons.regenerate"),
            "regen",
        )]);
    }

    let confirm = match flow {
        FlowType::Instant => t(language, "buttons.send"),
        FlowType::Scheduled => t(language, "buttons.confirm_schedule"),
    };
    rows.push(vec![InlineKeyboardButton::callback(confirm, "send")]);
    rows.push(cancel_row(language));

    InlineKeyboardMarkup::new(rows)
}

pub fn build_membership_keyboard(channels: &[String], language: &str) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = channels
        .iter()
        .filter_map(|channel| {
            let url = channel_url(channel)?;
            Some(vec![InlineKeyboardButton::url(channel.clone(), url)])
        })
        .collect();

    rows.push(vec![InlineKeyboardButton::callback(
        t(language, "buttons.joined"),
        "joined",
    )]);
    InlineKeyboardMarkup::new(rows)
}
