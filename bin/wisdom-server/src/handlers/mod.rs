//! Request logic behind the HTTP routes.
//!
//! Routes parse and validate; the functions here work on the session cache
//! and the store. Persistence on the chat path is best effort: a failed write
//! is logged and the turn carries on.

pub mod account;
pub mod chat;
pub mod like;

use tracing::{debug, info, warn};

use crate::entities::{AnalyticsEvent, AnalyticsStore, ConversationStore, MessageStore, ResilientStore, StoreError};
use crate::error::ServerError;
use crate::session::{ConversationState, SessionId, Turn};
use crate::tracker::MAX_QUESTIONS;

/// Log and swallow a failed write.
pub(crate) fn best_effort<T>(op: &'static str, result: Result<T, StoreError>) -> Option<T> {
    result.inspect_err(|e| warn!(op, error = %e, "persistence failed; continuing")).ok()
}

/// Record an analytics event. Always logged, stored when possible.
pub(crate) async fn log_event(store: &ResilientStore, event: AnalyticsEvent) {
    info!(
        event = %event.event_type,
        session_id = event.session_id.as_deref().unwrap_or("-"),
        conversation_id = event.conversation_id.as_deref().unwrap_or("-"),
        "analytics event"
    );
    best_effort("log_event", store.log_event(event).await);
}

/// Reconcile a cached session with the persisted store, once per cache entry.
///
/// The stored question count is authoritative; a session evicted from the
/// cache resumes with the count, history and likes it had. When the count
/// cannot be read the state stays unhydrated and the request is refused.
pub(crate) async fn hydrate(
    store: &ResilientStore,
    session: SessionId,
    state: &mut ConversationState,
) -> Result<(), ServerError> {
    if state.hydrated {
        return Ok(());
    }
    let key = session.to_string();
    let record = store.conversation_by_session(&key).await.map_err(|e| {
        warn!(session_id = %session, error = %e, "could not load session state");
        ServerError::Unavailable("conversation state is temporarily unavailable".into())
    })?;

    if let Some(record) = record {
        state.question_count = state.question_count.max(record.questions_asked.min(MAX_QUESTIONS));
        state.user_id = state.user_id.take().or(record.user_id);
        state.language = record.language;
        if state.history.is_empty() {
            match store.list_messages(&record.id).await {
                Ok(messages) => {
                    state.history = messages
                        .into_iter()
                        .map(|m| if m.is_user { Turn::user(m.message) } else { Turn::assistant(m.message) })
                        .collect();
                }
                Err(e) => warn!(session_id = %session, error = %e, "could not load message history"),
            }
        }
        debug!(
            session_id = %session,
            conversation_id = %record.id,
            question_count = state.question_count,
            "session rehydrated from store"
        );
        state.conversation_id = Some(record.id);
    }

    match store.liked_message_ids(&key).await {
        Ok(ids) => state.liked.extend(ids),
        Err(e) => warn!(session_id = %session, error = %e, "could not load liked messages"),
    }
    state.hydrated = true;
    Ok(())
}
