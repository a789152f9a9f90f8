use nglbot::i18n::{t, t_with_args};
use nglbot::session::{CountMode, FlowType, MessageSource, Reply};
use nglbot::settings::EngineSettings;
use teloxide::types::InlineKeyboardMarkup;

use super::keyboards::{
    build_cancel_keyboard, build_count_keyboard, build_language_keyboard, build_review_keyboard,
    build_source_keyboard,
};

/// Telegram rejects messages above 4096 characters.
const REVIEW_BUDGET: usize = 3500;

#[derive(Debug, Clone)]
pub struct Rendered {
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl Rendered {
    fn text(text: String) -> Self {
        Self {
            text,
            keyboard: None,
        }
    }

    fn with_keyboard(text: String, keyboard: InlineKeyboardMarkup) -> Self {
        Self {
            text,
            keyboard: Some(keyboard),
        }
    }
}

/// Numbered list of the pending batch, clipped to fit a single message.
pub fn numbered(messages: &[String]) -> String {
    let mut text = String::new();

    for (i, message) in messages.iter().enumerate() {
        let line = format!("{}. {}\n", i + 1, message);
        if text.chars().count() + line.chars().count() > REVIEW_BUDGET {
            text.push_str(&format!("… (+{})", messages.len() - i));
            return text;
        }
        text.push_str(&line);
    }

    text.trim_end().to_string()
}

fn count_prompt(mode: CountMode, language: &str) -> Rendered {
    match mode {
        CountMode::Menu { max } => Rendered::with_keyboard(
            t(language, "send.choose_count_menu"),
            build_count_keyboard(max, language),
        ),
        CountMode::FreeForm { max } => Rendered::with_keyboard(
            t_with_args(language, "send.choose_count_free", &[&max.to_string()]),
            build_cancel_keyboard(language),
        ),
    }
}

/// `None` for replies that should not produce a message.
pub fn render(reply: &Reply, language: &str, settings: &EngineSettings) -> Option<Rendered> {
    let rendered = match reply {
        Reply::QuotaExceeded {
            used,
            limit,
            reset_in,
        } => Rendered::text(t_with_args(
            language,
            "quota.exceeded",
            &[
                &used.to_string(),
                &limit.to_string(),
                &reset_in.num_hours().to_string(),
                &(reset_in.num_minutes() % 60).to_string(),
            ],
        )),
        Reply::AskLink(flow) => {
            let key = match flow {
                FlowType::Instant => "send.ask_link",
                FlowType::Scheduled => "schedule.ask_link",
            };
            Rendered::with_keyboard(
                t_with_args(language, key, &[&settings.link_prefix]),
                build_cancel_keyboard(language),
            )
        }
        Reply::InvalidLink => Rendered::text(t_with_args(
            language,
            "send.invalid_link",
            &[&settings.link_prefix],
        )),
        Reply::ChooseSource => Rendered::with_keyboard(
            t(language, "send.choose_source"),
            build_source_keyboard(language),
        ),
        Reply::ChooseLanguage => Rendered::with_keyboard(
            t(language, "send.choose_language"),
            build_language_keyboard(language),
        ),
        Reply::ChooseCount(mode) => count_prompt(*mode, language),
        Reply::InvalidCount(mode) => {
            let mut prompt = count_prompt(*mode, language);
            prompt.text = t_with_args(language, "send.invalid_count", &[&mode.max().to_string()]);
            prompt
        }
        Reply::CollectCustom { index, total } => Rendered::with_keyboard(
            t_with_args(
                language,
                "send.collect_custom",
                &[&index.to_string(), &total.to_string()],
            ),
            build_cancel_keyboard(language),
        ),
        Reply::EmptyMessage => Rendered::text(t(language, "send.empty_message")),
        Reply::Review {
            flow,
            source,
            messages,
        } => {
            let key = match source {
                MessageSource::Ai => "send.review_ai",
                MessageSource::Custom => "send.review_custom",
            };
            Rendered::with_keyboard(
                t_with_args(language, key, &[&numbered(messages)]),
                build_review_keyboard(*flow, *source, language),
            )
        }
        Reply::AskScheduleTime => Rendered::with_keyboard(
            t_with_args(language, "schedule.ask_time", &[settings.timezone.name()]),
            build_cancel_keyboard(language),
        ),
        Reply::InvalidScheduleTime => Rendered::text(t(language, "schedule.invalid_time")),
        Reply::ScheduleInPast => Rendered::text(t(language, "schedule.in_past")),
        Reply::Scheduled {
            batch_id,
            at,
            count,
        } => Rendered::text(t_with_args(
            language,
            "schedule.created",
            &[
                &count.to_string(),
                &at.with_timezone(&settings.timezone)
                    .format("%Y-%m-%d %H:%M")
                    .to_string(),
                &batch_id.to_string(),
            ],
        )),
        Reply::Dispatched { outcome, .. } => Rendered::text(t_with_args(
            language,
            "send.result",
            &[
                &outcome.success_count.to_string(),
                &outcome.failed_count.to_string(),
                &outcome.total().to_string(),
            ],
        )),
        Reply::OperatorOnly => Rendered::text(t(language, "errors.operator_only")),
        Reply::Cancelled => Rendered::text(t(language, "common.cancelled")),
        Reply::Failure => Rendered::text(t(language, "errors.generic")),
        Reply::Ignored => return None,
    };

    Some(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use nglbot::services::dispatch::DispatchOutcome;

    fn settings() -> EngineSettings {
        EngineSettings::default()
    }

    #[test]
    fn test_quota_notice_shows_wait() {
        let reply = Reply::QuotaExceeded {
            used: 8,
            limit: 8,
            reset_in: Duration::minutes(5 * 60 + 7),
        };
        let rendered = render(&reply, "en", &settings()).unwrap();
        assert!(rendered.text.contains("8 of 8"));
        assert!(rendered.text.contains("5h 7m"));
    }

    #[test]
    fn test_review_lists_messages_with_keyboard() {
        let reply = Reply::Review {
            flow: FlowType::Instant,
            source: MessageSource::Ai,
            messages: vec!["hey".into(), "hi".into()],
        };
        let rendered = render(&reply, "en", &settings()).unwrap();
        assert!(rendered.text.ends_with("1. hey\n2. hi"));
        assert!(rendered.keyboard.is_some());
    }

    #[test]
    fn test_numbered_clips_long_batches() {
        let messages: Vec<String> = (0..200).map(|_| "x".repeat(40)).collect();
        let text = numbered(&messages);
        assert!(text.chars().count() <= REVIEW_BUDGET + 16);
        assert!(text.ends_with(')'));
    }

    #[test]
    fn test_scheduled_confirmation_uses_local_time() {
        let reply = Reply::Scheduled {
            batch_id: 7,
            at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            count: 3,
        };
        let rendered = render(&reply, "en", &settings()).unwrap();
        assert!(rendered.text.contains("2030-01-01 05:30"));
        assert!(rendered.text.contains("#7"));
    }

    #[test]
    fn test_dispatch_result_totals() {
        let reply = Reply::Dispatched {
            endpoint_link: "https://ngl.link/alice".into(),
            outcome: DispatchOutcome {
                success_count: 3,
                failed_count: 1,
            },
        };
        let text = render(&reply, "en", &settings()).unwrap().text;
        assert!(text.contains("Successful: 3"));
        assert!(text.contains("Failed: 1"));
        assert!(text.contains("Total: 4"));
    }

    #[test]
    fn test_ignored_renders_nothing() {
        assert!(render(&Reply::Ignored, "en", &settings()).is_none());
    }

    #[test]
    fn test_invalid_menu_count_keeps_menu() {
        let rendered = render(
            &Reply::InvalidCount(CountMode::Menu { max: 4 }),
            "en",
            &settings(),
        )
        .unwrap();
        assert!(rendered.text.contains("1 to 4"));
        assert!(rendered.keyboard.is_some());
    }
}
