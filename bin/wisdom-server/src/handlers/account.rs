//! Registration and saving conversations for registered users.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;

use crate::entities::{
    AnalyticsEvent, ConversationPatch, ConversationRecord, ConversationStore, EventType, UserRecord, UserStore,
};
use crate::error::ServerError;
use crate::handlers::{best_effort, hydrate, log_event};
use crate::middleware::auth;
use crate::session::SessionId;
use crate::state::AppState;

/// Upsert the user, issue a fresh token and link `session` to the user.
///
/// Returns the user and the plain token; only its digest is stored.
pub async fn register(
    state: &AppState,
    email: &str,
    name: Option<&str>,
    session: Option<SessionId>,
) -> Result<(UserRecord, String), ServerError> {
    let email = email.trim().to_lowercase();
    let user = state.store.upsert_user(&email, name).await?;
    let token = auth::issue_token();
    state.store.set_token_hash(&user.id, &auth::token_digest(&token)).await?;

    let mut conversation_id = None;
    if let Some(session) = session {
        conversation_id = link_session(state, session, &user.id).await?;
    }

    let mut event = AnalyticsEvent::new(EventType::UserRegistration)
        .conversation(conversation_id.as_deref())
        .user(Some(user.id.as_str()))
        .data(json!({ "email": email, "name": name }));
    if let Some(session) = session {
        event = event.session(session);
    }
    log_event(&state.store, event).await;
    info!(user_id = %user.id, "user registered");
    Ok((user, token))
}

/// Attach `user_id` to the session's state and conversation row.
///
/// The session's history and question count are left as they are.
async fn link_session(state: &AppState, session: SessionId, user_id: &str) -> Result<Option<String>, ServerError> {
    let mut conv = state.sessions.acquire(session).await;
    hydrate(&state.store, session, &mut conv).await?;
    conv.user_id = Some(user_id.to_owned());

    match conv.conversation_id.clone() {
        Some(id) => {
            let patch = ConversationPatch { user_id: Some(user_id.to_owned()), ..Default::default() };
            best_effort("update_conversation", state.store.update_conversation(&id, &patch).await);
        }
        None => {
            let created = state
                .store
                .create_conversation(Some(user_id), &session.to_string(), conv.language)
                .await;
            if let Some(record) = best_effort("create_conversation", created) {
                conv.conversation_id = Some(record.id);
            }
        }
    }
    Ok(conv.conversation_id.clone())
}

/// Find the conversation a save request refers to.
pub async fn find_conversation(
    state: &AppState,
    conversation_id: Option<&str>,
    session_id: Option<&str>,
) -> Result<Option<ConversationRecord>, ServerError> {
    if let Some(id) = conversation_id {
        return Ok(state.store.get_conversation(id).await?);
    }
    let Some(raw) = session_id else {
        return Err(ServerError::BadRequest("sessionId or conversationId is required".into()));
    };
    let session = SessionId::parse(raw).ok_or_else(|| ServerError::BadRequest("sessionId must be a UUID".into()))?;
    Ok(state.store.conversation_by_session(&session.to_string()).await?)
}

/// Mark a conversation saved by `user`.
///
/// An unlinked conversation is claimed by the user; one linked to somebody
/// else is reported as missing.
pub async fn save_chat(
    state: &AppState,
    user: &UserRecord,
    conversation: Option<ConversationRecord>,
    message_count: Option<u32>,
) -> Result<DateTime<Utc>, ServerError> {
    let conversation = conversation
        .filter(|c| c.user_id.as_deref().is_none_or(|owner| owner == user.id))
        .ok_or_else(|| ServerError::NotFound("conversation not found".into()))?;

    let saved_at = Utc::now();
    let patch = ConversationPatch {
        user_id: Some(user.id.clone()),
        saved_at: Some(saved_at),
        ..Default::default()
    };
    state.store.update_conversation(&conversation.id, &patch).await?;
    if let Some(session) = SessionId::parse(&conversation.session_id) {
        let user_id = user.id.clone();
        state.sessions.upsert(session, move |c| c.user_id = Some(user_id)).await;
    }

    let event = AnalyticsEvent::new(EventType::ChatSaved)
        .conversation(Some(conversation.id.as_str()))
        .user(Some(user.id.as_str()))
        .session(&conversation.session_id)
        .data(json!({ "message_count": message_count }));
    log_event(&state.store, event).await;
    Ok(saved_at)
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::handlers::chat::{self, ChatTurn};
    use crate::handlers::test_support::{CountingOracle, app_state};

    #[tokio::test]
    async fn registering_keeps_history_and_count() {
        let (state, _dir) = app_state(Arc::new(CountingOracle::default())).await;
        let session = SessionId::new_random();
        let turn = ChatTurn {
            session,
            message: "What is karma?".into(),
            email: None,
            name: None,
            idempotency_key: None,
        };
        let reply = chat::run(state.clone(), turn).await.unwrap();
        let before = state.sessions.get(session).await.unwrap();

        let (user, token) = register(&state, "Seeker@Example.com", Some("Seeker"), Some(session)).await.unwrap();
        assert_eq!(user.email, "seeker@example.com");
        assert!(!token.is_empty());

        let after = state.sessions.get(session).await.unwrap();
        assert_eq!(after.user_id.as_deref(), Some(user.id.as_str()));
        assert!(after.history.len() >= before.history.len());
        assert_eq!(after.question_count, 1);

        let conv = state.store.get_conversation(&reply.conversation_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(conv.user_id, Some(user.id.clone()));
        let by_token = state.store.user_by_token_hash(&auth::token_digest(&token)).await.unwrap();
        assert_eq!(by_token.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn cannot_save_someone_elses_chat() {
        let (state, _dir) = app_state(Arc::new(CountingOracle::default())).await;
        let session = SessionId::new_random();
        let (owner, _) = register(&state, "owner@example.com", None, Some(session)).await.unwrap();
        let (other, _) = register(&state, "other@example.com", None, None).await.unwrap();

        let conversation = find_conversation(&state, None, Some(&session.to_string())).await.unwrap();
        let err = save_chat(&state, &other, conversation.clone(), None).await.unwrap_err();
        assert!(matches!(err, ServerError::NotFound(_)));

        save_chat(&state, &owner, conversation, Some(2)).await.unwrap();
        assert_eq!(state.store.saved_chats(&owner.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn save_needs_an_identifier() {
        let (state, _dir) = app_state(Arc::new(CountingOracle::default())).await;
        let err = find_conversation(&state, None, None).await.unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
    }
}
