//! Per-user conversation state for composing a batch.
//!
//! Inbound events are parsed into an [`Action`] once at the transport edge, run through the pure
//! [`transition`] table, and the resulting effect is executed by [`Conversation`].

mod engine;
mod transition;

pub use engine::Conversation;
pub use transition::{transition, Effect, Next, Transition, TransitionContext};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::services::dispatch::DispatchOutcome;
use crate::services::generation::Language;

pub const SCHEDULE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    AwaitingLink,
    AwaitingMessageType,
    /// Language for the AI branch, count for the custom branch.
    AwaitingLanguageOrCustomCount,
    AwaitingCount,
    AwaitingCustomMessages,
    AwaitingConfirmation,
    AwaitingScheduleTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    Instant,
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    Ai,
    Custom,
}

/// How a count may be entered at the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountMode {
    Menu { max: u32 },
    FreeForm { max: u32 },
}

impl CountMode {
    pub fn max(&self) -> u32 {
        match self {
            CountMode::Menu { max } | CountMode::FreeForm { max } => *max,
        }
    }

    pub fn accepts(&self, count: u32) -> bool {
        (1..=self.max()).contains(&count)
    }
}

/// Absence of a session is the idle state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub step: Step,
    pub flow: FlowType,
    pub endpoint_link: Option<String>,
    pub source: Option<MessageSource>,
    pub language: Option<Language>,
    pub count: u32,
    pub messages: Vec<String>,
}

impl SessionState {
    pub fn begin(flow: FlowType) -> Self {
        Self {
            step: Step::AwaitingLink,
            flow,
            endpoint_link: None,
            source: None,
            language: None,
            count: 0,
            messages: Vec::new(),
        }
    }

    /// Custom messages still to be collected.
    pub fn remaining(&self) -> usize {
        (self.count as usize).saturating_sub(self.messages.len())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    BeginSend,
    BeginSchedule,
    ChooseSource(MessageSource),
    ChooseLanguage(Language),
    ChooseCount(u32),
    Regenerate,
    Send,
    Cancel,
    Text(String),
}

impl Action {
    /// Parses inline-button payloads such as `src:ai`, `lang:hindi` or `count:3`.
    pub fn from_callback(data: &str) -> Option<Action> {
        match data {
            "regen" => return Some(Action::Regenerate),
            "send" => return Some(Action::Send),
            "cancel" => return Some(Action::Cancel),
            _ => {}
        }

        let (kind, value) = data.split_once(':')?;
        match kind {
            "src" => match value {
                "ai" => Some(Action::ChooseSource(MessageSource::Ai)),
                "custom" => Some(Action::ChooseSource(MessageSource::Custom)),
                _ => None,
            },
            "lang" => Language::parse(value).map(Action::ChooseLanguage),
            "count" => value.parse().ok().map(Action::ChooseCount),
            _ => None,
        }
    }
}

/// Everything the engine wants the user to see. Rendering belongs to the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    QuotaExceeded {
        used: u32,
        limit: u32,
        reset_in: chrono::Duration,
    },
    AskLink(FlowType),
    InvalidLink,
    ChooseSource,
    ChooseLanguage,
    ChooseCount(CountMode),
    InvalidCount(CountMode),
    CollectCustom {
        index: usize,
        total: usize,
    },
    EmptyMessage,
    Review {
        flow: FlowType,
        source: MessageSource,
        messages: Vec<String>,
    },
    AskScheduleTime,
    InvalidScheduleTime,
    ScheduleInPast,
    Scheduled {
        batch_id: i32,
        at: DateTime<Utc>,
        count: usize,
    },
    Dispatched {
        endpoint_link: String,
        outcome: DispatchOutcome,
    },
    OperatorOnly,
    Cancelled,
    Failure,
    Ignored,
}

/// Sessions keyed by user id. The lock is only taken for reads and writes, never across an await.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<i64, SessionState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: i64) -> Option<SessionState> {
        self.lock().get(&user_id).cloned()
    }

    pub fn set(&self, user_id: i64, state: SessionState) {
        self.lock().insert(user_id, state);
    }

    pub fn clear(&self, user_id: i64) {
        self.lock().remove(&user_id);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, SessionState>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
