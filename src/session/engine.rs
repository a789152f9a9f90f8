use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::transition::{transition, Effect, Next, TransitionContext};
use super::{Action, FlowType, MessageSource, Reply, SessionState, SessionStore};
use crate::db::DbError;
use crate::models::{BatchStatus, DispatchRecord, NewScheduledBatch};
use crate::observability::{OperatorNotifier, Severity, METRICS};
use crate::services::dispatch::{DispatchWorker, ProgressSink};
use crate::services::generation::{generate_exact, MessageGenerator};
use crate::services::quota::QuotaLimiter;
use crate::settings::EngineSettings;
use crate::store::DispatchStore;

/// Runs the session state machine for every user and executes the effects it asks for.
pub struct Conversation {
    sessions: SessionStore,
    store: Arc<dyn DispatchStore>,
    limiter: QuotaLimiter,
    generator: Arc<dyn MessageGenerator>,
    worker: Arc<DispatchWorker>,
    notifier: Arc<dyn OperatorNotifier>,
    settings: EngineSettings,
}

impl Conversation {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        limiter: QuotaLimiter,
        generator: Arc<dyn MessageGenerator>,
        worker: Arc<DispatchWorker>,
        notifier: Arc<dyn OperatorNotifier>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            sessions: SessionStore::new(),
            store,
            limiter,
            generator,
            worker,
            notifier,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn session(&self, user_id: i64) -> Option<SessionState> {
        self.sessions.get(user_id)
    }

    pub async fn handle(
        &self,
        user_id: i64,
        action: Action,
        progress: Option<&dyn ProgressSink>,
    ) -> Reply {
        self.handle_at(user_id, action, Utc::now(), progress).await
    }

    pub async fn handle_at(
        &self,
        user_id: i64,
        action: Action,
        now: DateTime<Utc>,
        progress: Option<&dyn ProgressSink>,
    ) -> Reply {
        let is_operator = self.settings.is_operator(user_id);
        let current = self.sessions.get(user_id);
        let step = transition(
            current.as_ref(),
            action,
            &TransitionContext {
                now,
                is_operator,
                settings: &self.settings,
            },
        );

        match step.effect {
            Effect::Reply(reply) => {
                self.apply(user_id, step.next);
                reply
            }

            Effect::GateEntry => match self.quota_refusal(user_id, 0, now).await {
                Ok(Some(refusal)) => {
                    self.sessions.clear(user_id);
                    refusal
                }
                Ok(None) => {
                    let flow = match &step.next {
                        Next::Set(state) => state.flow,
                        _ => FlowType::Instant,
                    };
                    self.apply(user_id, step.next);
                    Reply::AskLink(flow)
                }
                Err(reply) => reply,
            },

            Effect::Generate { language, count } => {
                let Next::Set(mut state) = step.next else {
                    return Reply::Ignored;
                };
                let messages = generate_exact(self.generator.as_ref(), language, count).await;
                state.messages = messages.clone();
                let flow = state.flow;
                self.sessions.set(user_id, state);
                Reply::Review {
                    flow,
                    source: MessageSource::Ai,
                    messages,
                }
            }

            Effect::Dispatch {
                endpoint_link,
                messages,
            } => {
                if !is_operator {
                    match self.quota_refusal(user_id, messages.len(), now).await {
                        Ok(Some(refusal)) => {
                            self.sessions.clear(user_id);
                            return refusal;
                        }
                        Ok(None) => {}
                        Err(reply) => return reply,
                    }
                }
                self.apply(user_id, step.next);

                let outcome = self
                    .worker
                    .dispatch_batch(user_id, &endpoint_link, &messages, progress)
                    .await;

                self.notifier
                    .notice(&format!(
                        "📨 New message batch\nUser: {}\nLink: {}\nSuccess: {}/{}\nTime: {}",
                        user_id,
                        endpoint_link,
                        outcome.success_count,
                        outcome.total(),
                        Utc::now()
                            .with_timezone(&self.settings.timezone)
                            .format("%Y-%m-%d %H:%M:%S")
                    ))
                    .await;

                Reply::Dispatched {
                    endpoint_link,
                    outcome,
                }
            }

            Effect::Persist {
                endpoint_link,
                messages,
                at,
            } => {
                if !is_operator {
                    match self.quota_refusal(user_id, messages.len(), now).await {
                        Ok(Some(refusal)) => {
                            self.sessions.clear(user_id);
                            return refusal;
                        }
                        Ok(None) => {}
                        Err(reply) => return reply,
                    }
                }

                let created = self.store.create_scheduled_batch(NewScheduledBatch {
                    user_id,
                    endpoint_link: &endpoint_link,
                    messages: &messages,
                    scheduled_time: at,
                    status: BatchStatus::Scheduled.as_str(),
                });

                match created {
                    Ok(batch) => {
                        self.apply(user_id, step.next);
                        METRICS.increment_batches_scheduled();
                        tracing::info!(
                            "User {} scheduled batch {} for {}",
                            user_id,
                            batch.id,
                            at
                        );
                        Reply::Scheduled {
                            batch_id: batch.id,
                            at,
                            count: messages.len(),
                        }
                    }
                    Err(e) => {
                        self.persistence_failure("create scheduled batch", &e).await;
                        Reply::Failure
                    }
                }
            }
        }
    }

    /// Most recent dispatch records of a user, newest first.
    pub fn recent_history(&self, user_id: i64) -> Result<Vec<DispatchRecord>, DbError> {
        self.store
            .list_recent_dispatches(user_id, self.settings.history_limit)
    }

    fn apply(&self, user_id: i64, next: Next) {
        match next {
            Next::Keep => {}
            Next::Set(state) => self.sessions.set(user_id, state),
            Next::Clear => self.sessions.clear(user_id),
        }
    }

    /// `Ok(Some(_))` when sending `pending` more messages would break the ceiling. With nothing
    /// pending the user is refused once the ceiling is reached.
    async fn quota_refusal(
        &self,
        user_id: i64,
        pending: usize,
        now: DateTime<Utc>,
    ) -> Result<Option<Reply>, Reply> {
        let status = match self.limiter.check_and_maybe_reset(user_id, now) {
            Ok(status) => status,
            Err(e) => {
                self.persistence_failure("check quota", &e).await;
                return Err(Reply::Failure);
            }
        };

        let limit = self.settings.daily_quota;
        let refused = if pending == 0 {
            status.count >= limit
        } else {
            status.count as usize + pending > limit as usize
        };

        if !refused {
            return Ok(None);
        }

        tracing::info!(
            "Quota refusal for user {}: {}/{} used, {} pending",
            user_id,
            status.count,
            limit,
            pending
        );
        METRICS.increment_quota_refusals();

        Ok(Some(Reply::QuotaExceeded {
            used: status.count,
            limit,
            reset_in: self.limiter.time_until_reset(&status, now),
        }))
    }

    async fn persistence_failure(&self, operation: &str, error: &DbError) {
        tracing::error!("Failed to {}: {}", operation, error);
        METRICS.increment_errors();
        self.notifier
            .alert(
                Severity::Error,
                "Store",
                &format!("Failed to {}: {}", operation, error),
            )
            .await;
    }
}
