use serde_json::json;
use tracing::debug;

use crate::entities::{AnalyticsEvent, AnalyticsStore, EventType};
use crate::error::ServerError;
use crate::handlers::hydrate;
use crate::session::SessionId;
use crate::state::AppState;

/// Record that `session` liked `message_id`.
///
/// Returns `true` when the session had already liked it, in which case
/// nothing is recorded.
pub async fn like(
    state: &AppState,
    session: SessionId,
    message_id: String,
    conversation_id: Option<&str>,
    content: Option<&str>,
) -> Result<bool, ServerError> {
    let mut conv = state.sessions.acquire(session).await;
    hydrate(&state.store, session, &mut conv).await?;
    if conv.liked.contains(&message_id) {
        debug!(%session, %message_id, "message already liked by session");
        return Ok(true);
    }

    let event = AnalyticsEvent::new(EventType::MessageLiked)
        .conversation(conversation_id.or(conv.conversation_id.as_deref()))
        .user(conv.user_id.as_deref())
        .session(session)
        .message(&message_id)
        .data(json!({ "message_content": content }));
    state.store.log_event(event).await?;
    conv.liked.insert(message_id);
    Ok(false)
}
