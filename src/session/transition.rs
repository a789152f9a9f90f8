use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use super::{
    Action, CountMode, FlowType, MessageSource, Reply, SessionState, Step, SCHEDULE_TIME_FORMAT,
};
use crate::link;
use crate::services::generation::Language;
use crate::settings::EngineSettings;

pub struct TransitionContext<'a> {
    pub now: DateTime<Utc>,
    pub is_operator: bool,
    pub settings: &'a EngineSettings,
}

impl TransitionContext<'_> {
    /// Operators and the scheduled flow type a number; everyone else picks from the menu.
    pub fn count_mode(&self, flow: FlowType) -> CountMode {
        if self.is_operator || flow == FlowType::Scheduled {
            CountMode::FreeForm {
                max: self.settings.max_free_form_count,
            }
        } else {
            CountMode::Menu {
                max: self.settings.per_request_cap,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Next {
    Keep,
    Set(SessionState),
    Clear,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Reply(Reply),
    /// Quota check for entering a flow. The new state is applied only if it passes.
    GateEntry,
    /// Fill the pending batch of the new state, then show it for review.
    Generate { language: Language, count: u32 },
    Dispatch {
        endpoint_link: String,
        messages: Vec<String>,
    },
    Persist {
        endpoint_link: String,
        messages: Vec<String>,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: Next,
    pub effect: Effect,
}

impl Transition {
    fn keep(reply: Reply) -> Self {
        Self {
            next: Next::Keep,
            effect: Effect::Reply(reply),
        }
    }

    fn set(state: SessionState, reply: Reply) -> Self {
        Self {
            next: Next::Set(state),
            effect: Effect::Reply(reply),
        }
    }

    fn ignored() -> Self {
        Self::keep(Reply::Ignored)
    }
}

pub fn transition(
    state: Option<&SessionState>,
    action: Action,
    ctx: &TransitionContext<'_>,
) -> Transition {
    match (state, action) {
        (_, Action::BeginSend) => begin(FlowType::Instant, ctx),
        (_, Action::BeginSchedule) => {
            if ctx.settings.schedule_operator_only && !ctx.is_operator {
                Transition::keep(Reply::OperatorOnly)
            } else {
                begin(FlowType::Scheduled, ctx)
            }
        }
        (None, _) => Transition::ignored(),
        (Some(_), Action::Cancel) => Transition {
            next: Next::Clear,
            effect: Effect::Reply(Reply::Cancelled),
        },
        (Some(state), action) => advance(state.clone(), action, ctx),
    }
}

/// Every entry starts from a blank state, so a restart never reuses an earlier link.
fn begin(flow: FlowType, ctx: &TransitionContext<'_>) -> Transition {
    let state = SessionState::begin(flow);
    if ctx.is_operator {
        Transition::set(state, Reply::AskLink(flow))
    } else {
        Transition {
            next: Next::Set(state),
            effect: Effect::GateEntry,
        }
    }
}

fn advance(mut state: SessionState, action: Action, ctx: &TransitionContext<'_>) -> Transition {
    let mode = ctx.count_mode(state.flow);

    match (state.step, action) {
        (Step::AwaitingLink, Action::Text(text)) => {
            match link::validate(&text, &ctx.settings.link_prefix) {
                Ok(endpoint_link) => {
                    state.endpoint_link = Some(endpoint_link);
                    state.step = Step::AwaitingMessageType;
                    Transition::set(state, Reply::ChooseSource)
                }
                Err(e) => {
                    tracing::debug!("Rejected link input: {}", e);
                    Transition::keep(Reply::InvalidLink)
                }
            }
        }

        (Step::AwaitingMessageType, Action::ChooseSource(source)) => {
            state.source = Some(source);
            state.step = Step::AwaitingLanguageOrCustomCount;
            let reply = match source {
                MessageSource::Ai => Reply::ChooseLanguage,
                MessageSource::Custom => Reply::ChooseCount(mode),
            };
            Transition::set(state, reply)
        }

        (Step::AwaitingLanguageOrCustomCount, Action::ChooseLanguage(language))
            if state.source == Some(MessageSource::Ai) =>
        {
            state.language = Some(language);
            state.step = Step::AwaitingCount;
            Transition::set(state, Reply::ChooseCount(mode))
        }

        (Step::AwaitingLanguageOrCustomCount, action)
            if state.source == Some(MessageSource::Custom) =>
        {
            let Some(input) = count_input(&action) else {
                return reprompt(&state, mode);
            };
            match input.filter(|count| mode.accepts(*count)) {
                Some(count) => {
                    state.count = count;
                    state.messages.clear();
                    state.step = Step::AwaitingCustomMessages;
                    Transition::set(
                        state,
                        Reply::CollectCustom {
                            index: 1,
                            total: count as usize,
                        },
                    )
                }
                None => Transition::keep(Reply::InvalidCount(mode)),
            }
        }

        (Step::AwaitingCount, action) => {
            let Some(input) = count_input(&action) else {
                return reprompt(&state, mode);
            };
            let Some(language) = state.language else {
                return reprompt(&state, mode);
            };
            match input.filter(|count| mode.accepts(*count)) {
                Some(count) => {
                    state.count = count;
                    state.messages.clear();
                    state.step = Step::AwaitingConfirmation;
                    Transition {
                        next: Next::Set(state),
                        effect: Effect::Generate { language, count },
                    }
                }
                None => Transition::keep(Reply::InvalidCount(mode)),
            }
        }

        (Step::AwaitingCustomMessages, Action::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Transition::keep(Reply::EmptyMessage);
            }
            state.messages.push(text.to_string());

            if state.remaining() == 0 {
                state.step = Step::AwaitingConfirmation;
                let reply = Reply::Review {
                    flow: state.flow,
                    source: MessageSource::Custom,
                    messages: state.messages.clone(),
                };
                Transition::set(state, reply)
            } else {
                let reply = Reply::CollectCustom {
                    index: state.messages.len() + 1,
                    total: state.count as usize,
                };
                Transition::set(state, reply)
            }
        }

        (Step::AwaitingConfirmation, Action::Regenerate) => {
            match (state.source, state.language) {
                (Some(MessageSource::Ai), Some(language)) => {
                    let count = state.count;
                    Transition {
                        next: Next::Set(state),
                        effect: Effect::Generate { language, count },
                    }
                }
                _ => reprompt(&state, mode),
            }
        }

        (Step::AwaitingConfirmation, Action::Send) => {
            let Some(endpoint_link) = state.endpoint_link.clone() else {
                return reprompt(&state, mode);
            };
            match state.flow {
                FlowType::Instant => Transition {
                    next: Next::Clear,
                    effect: Effect::Dispatch {
                        endpoint_link,
                        messages: state.messages,
                    },
                },
                FlowType::Scheduled => {
                    state.step = Step::AwaitingScheduleTime;
                    Transition::set(state, Reply::AskScheduleTime)
                }
            }
        }

        (Step::AwaitingScheduleTime, Action::Text(text)) => {
            let Some(at) = parse_schedule_time(&text, ctx.settings.timezone) else {
                return Transition::keep(Reply::InvalidScheduleTime);
            };
            if at <= ctx.now {
                return Transition::keep(Reply::ScheduleInPast);
            }
            let Some(endpoint_link) = state.endpoint_link.clone() else {
                return reprompt(&state, mode);
            };
            Transition {
                next: Next::Clear,
                effect: Effect::Persist {
                    endpoint_link,
                    messages: state.messages,
                    at,
                },
            }
        }

        _ => reprompt(&state, mode),
    }
}

/// Repeats the question for the current step without changing the session.
fn reprompt(state: &SessionState, mode: CountMode) -> Transition {
    let reply = match state.step {
        Step::AwaitingLink => Reply::AskLink(state.flow),
        Step::AwaitingMessageType => Reply::ChooseSource,
        Step::AwaitingLanguageOrCustomCount => match state.source {
            Some(MessageSource::Custom) => Reply::ChooseCount(mode),
            _ => Reply::ChooseLanguage,
        },
        Step::AwaitingCount => Reply::ChooseCount(mode),
        Step::AwaitingCustomMessages => Reply::CollectCustom {
            index: state.messages.len() + 1,
            total: state.count as usize,
        },
        Step::AwaitingConfirmation => Reply::Review {
            flow: state.flow,
            source: state.source.unwrap_or(MessageSource::Custom),
            messages: state.messages.clone(),
        },
        Step::AwaitingScheduleTime => Reply::AskScheduleTime,
    };
    Transition::keep(reply)
}

/// `None` when the action is not a count at all, `Some(None)` for an unparsable number.
fn count_input(action: &Action) -> Option<Option<u32>> {
    match action {
        Action::ChooseCount(count) => Some(Some(*count)),
        Action::Text(text) => Some(text.trim().parse().ok()),
        _ => None,
    }
}

/// Reads a `YYYY-MM-DD HH:MM` wall-clock time in `tz`.
pub fn parse_schedule_time(text: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(text.trim(), SCHEDULE_TIME_FORMAT).ok()?;
    tz.from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
}
