//! Text rendering for the `/track` command.

use chrono_tz::Tz;

use crate::i18n::{t, t_with_args};
use crate::models::{DispatchRecord, DispatchStatus};

pub const PREVIEW_CHARS: usize = 50;
const TIMESTAMP_FORMAT: &str = "%m/%d %H:%M";

pub fn status_icon(record: &DispatchRecord) -> &'static str {
    match record.status_enum() {
        Some(DispatchStatus::Success) => "✅",
        _ => "❌",
    }
}

pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Renders records in the order given; callers pass them newest first.
pub fn render_history(records: &[DispatchRecord], timezone: Tz, language: &str) -> String {
    if records.is_empty() {
        return t(language, "track.empty");
    }

    let mut text = t(language, "track.header");
    for record in records {
        let time = record
            .created_at
            .with_timezone(&timezone)
            .format(TIMESTAMP_FORMAT)
            .to_string();
        text.push_str(&t_with_args(
            language,
            "track.entry",
            &[
                status_icon(record),
                &time,
                &record.endpoint_link,
                &preview(&record.message_text),
            ],
        ));
    }

    text.trim_end().to_string()
}
