//! One chat turn: decide, answer, persist.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::{debug, info, instrument};

use crate::entities::{AnalyticsEvent, ConversationPatch, ConversationStore, EventType, MessageStore, UserStore};
use crate::error::ServerError;
use crate::handlers::{best_effort, hydrate, log_event};
use crate::language;
use crate::prompt;
use crate::session::{ChatReply, Role, SessionId, Turn};
use crate::state::AppState;
use crate::tracker::{self, Decision, MAX_QUESTIONS};
use crate::wisdom;

/// A validated chat submission.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub session: SessionId,
    pub message: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Answer `turn`, holding the session lock from decision to persistence.
#[instrument(skip_all, fields(session_id = %turn.session))]
pub async fn run(state: Arc<AppState>, turn: ChatTurn) -> Result<ChatReply, ServerError> {
    let language = language::detect(&turn.message);
    let mut conv = state.sessions.acquire(turn.session).await;
    hydrate(&state.store, turn.session, &mut conv).await?;

    let key = tracker::attempt_key(turn.idempotency_key.as_deref(), &turn.message);
    let (count, counted) = match tracker::record_attempt(&mut conv, key, Instant::now(), state.config.dedupe_window) {
        Decision::Replay(reply) => {
            info!(question_count = reply.question_count, "duplicate submission; replaying reply");
            return Ok(reply);
        }
        Decision::LimitReached(count) => {
            info!(%language, "question limit reached; oracle not called");
            return Ok(ChatReply {
                message: tracker::limit_message(language).to_owned(),
                question_count: count,
                conversation_id: conv.conversation_id.clone(),
                message_id: None,
                language,
                limit_reached: true,
                fallback: false,
            });
        }
        Decision::Counted(count) => (count, true),
        Decision::Retry(count) => {
            info!(question_count = count, "retrying unfinished submission uncounted");
            (count, false)
        }
    };
    conv.language = language;
    let session_key = turn.session.to_string();

    // An email only claims a session nobody has claimed yet.
    if let (None, Some(email)) = (conv.user_id.as_deref(), turn.email.as_deref()) {
        let user = state.store.upsert_user(email, turn.name.as_deref()).await;
        if let Some(user) = best_effort("upsert_user", user) {
            debug!(user_id = %user.id, "session linked to user by chat email");
            conv.user_id = Some(user.id);
        }
    }

    if conv.conversation_id.is_none() {
        let created = state
            .store
            .create_conversation(conv.user_id.as_deref(), &session_key, language)
            .await;
        if let Some(record) = best_effort("create_conversation", created) {
            let event = AnalyticsEvent::new(EventType::ConversationStarted)
                .conversation(Some(record.id.as_str()))
                .user(conv.user_id.as_deref())
                .session(&session_key)
                .data(json!({ "language": language }));
            log_event(&state.store, event).await;
            conv.conversation_id = Some(record.id);
        }
    }
    let conversation_id = conv.conversation_id.clone();

    // Write the count through; the store is the source of truth.
    if let Some(id) = conversation_id.as_deref() {
        let patch = ConversationPatch {
            user_id: conv.user_id.clone(),
            language: Some(language),
            questions_asked: counted.then_some(count),
            saved_at: None,
        };
        best_effort("update_conversation", state.store.update_conversation(id, &patch).await);
    }

    let repeated = !counted
        && conv
            .history
            .last()
            .is_some_and(|t| t.role == Role::User && t.content == turn.message);
    if !repeated {
        conv.history.push(Turn::user(turn.message.clone()));
        if let Some(id) = conversation_id.as_deref() {
            best_effort("save_message", state.store.save_message(id, &turn.message, true, language).await);
        }
    }

    let system = prompt::system_message(language, count);
    let answer = state.oracle.answer(system, &conv.history, language, count).await;
    conv.history.push(Turn::assistant(answer.text.clone()));
    let overflow = conv.history.len().saturating_sub(state.config.history_window);
    conv.history.drain(..overflow);

    let mut message_id = None;
    if let Some(id) = conversation_id.as_deref() {
        let saved = state.store.save_message(id, &answer.text, false, language).await;
        if let Some(saved) = best_effort("save_message", saved) {
            if let Some(quote) = wisdom::extract_quote(&answer.text) {
                best_effort("save_quote", state.store.save_quote(&saved.id, &quote, language).await);
            }
            message_id = Some(saved.id);
        }
    }

    let reply = ChatReply {
        message: answer.text,
        question_count: count,
        conversation_id,
        message_id,
        language,
        limit_reached: count >= MAX_QUESTIONS,
        fallback: answer.fallback,
    };
    tracker::complete_attempt(&mut conv, &reply);
    info!(question_count = count, %language, fallback = reply.fallback, "chat turn answered");
    Ok(reply)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::handlers::test_support::{CountingOracle, app_state};
    use crate::cache::SessionCache;

    fn turn(session: SessionId, message: &str) -> ChatTurn {
        ChatTurn {
            session,
            message: message.to_owned(),
            email: None,
            name: None,
            idempotency_key: None,
        }
    }

    #[tokio::test]
    async fn counts_persist_and_survive_eviction() {
        let oracle = Arc::new(CountingOracle::default());
        let (state, _dir) = app_state(oracle.clone()).await;
        let session = SessionId::new_random();

        let first = run(state.clone(), turn(session, "What is dharma?")).await.unwrap();
        assert_eq!(first.question_count, 1);
        assert!(first.message_id.is_some());
        let conversation_id = first.conversation_id.clone().unwrap();

        let stored = state.store.get_conversation(&conversation_id).await.unwrap().unwrap();
        assert_eq!(stored.questions_asked, 1);
        let messages = state.store.list_messages(&conversation_id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].contains_quote);

        // An empty cache must pick the count back up from the store.
        let cold = Arc::new(AppState {
            sessions: Arc::new(SessionCache::new(state.config.session_ttl, 8)),
            ..(*state).clone()
        });
        let second = run(cold.clone(), turn(session, "How do I find peace?")).await.unwrap();
        assert_eq!(second.question_count, 2);
        assert_eq!(second.conversation_id.as_deref(), Some(conversation_id.as_str()));
        assert_eq!(oracle.calls(), 2);

        let restored = cold.sessions.get(session).await.unwrap();
        assert_eq!(restored.history.len(), 4);
    }

    #[tokio::test]
    async fn limit_is_enforced_without_oracle_call() {
        let oracle = Arc::new(CountingOracle::default());
        let (state, _dir) = app_state(oracle.clone()).await;
        let session = SessionId::new_random();
        for (i, q) in ["One?", "Two?", "Three?"].into_iter().enumerate() {
            let reply = run(state.clone(), turn(session, q)).await.unwrap();
            assert_eq!(usize::from(reply.question_count), i + 1);
        }
        let blocked = run(state.clone(), turn(session, "Four?")).await.unwrap();
        assert!(blocked.limit_reached);
        assert_eq!(blocked.question_count, 3);
        assert_eq!(blocked.message, tracker::limit_message(blocked.language));
        assert_eq!(oracle.calls(), 3);
    }

    #[tokio::test]
    async fn resubmission_is_replayed() {
        let oracle = Arc::new(CountingOracle::default());
        let (state, _dir) = app_state(oracle.clone()).await;
        let session = SessionId::new_random();
        let mut submission = turn(session, "kya hai dharma");
        submission.idempotency_key = Some("req-1".into());

        let first = run(state.clone(), submission.clone()).await.unwrap();
        let again = run(state.clone(), submission).await.unwrap();
        assert_eq!(first, again);
        assert_eq!(again.question_count, 1);
        assert_eq!(again.language, crate::language::Language::Hindi);
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn email_links_user() {
        let oracle = Arc::new(CountingOracle::default());
        let (state, _dir) = app_state(oracle).await;
        let mut submission = turn(SessionId::new_random(), "Who am I?");
        submission.email = Some("seeker@example.com".into());
        let reply = run(state.clone(), submission).await.unwrap();

        let conv = state.store.get_conversation(&reply.conversation_id.unwrap()).await.unwrap().unwrap();
        let user = state.store.upsert_user("seeker@example.com", None).await.unwrap();
        assert_eq!(conv.user_id, Some(user.id));
    }

    #[tokio::test]
    async fn email_does_not_relink_a_claimed_session() {
        let (state, _dir) = app_state(Arc::new(CountingOracle::default())).await;
        let session = SessionId::new_random();
        let mut first = turn(session, "Who am I?");
        first.email = Some("first@example.com".into());
        let reply = run(state.clone(), first).await.unwrap();

        let mut second = turn(session, "Where am I going?");
        second.email = Some("second@example.com".into());
        run(state.clone(), second).await.unwrap();

        let owner = state.store.upsert_user("first@example.com", None).await.unwrap();
        let conv = state.store.get_conversation(&reply.conversation_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(conv.user_id, Some(owner.id));
        let other = state.store.upsert_user("second@example.com", None).await.unwrap();
        assert_eq!(state.store.user_stats(&other.id).await.unwrap().conversations, 0);
    }

    #[tokio::test]
    async fn exhausted_session_stays_blocked_when_database_fails() {
        let oracle = Arc::new(CountingOracle::default());
        let (state, _dir) = app_state(oracle.clone()).await;
        let session = SessionId::new_random();
        for q in ["One?", "Two?", "Three?"] {
            run(state.clone(), turn(session, q)).await.unwrap();
        }
        assert!(run(state.clone(), turn(session, "Four?")).await.unwrap().limit_reached);

        state.store.relational().unwrap().close().await;
        let cold = Arc::new(AppState {
            sessions: Arc::new(SessionCache::new(state.config.session_ttl, 8)),
            ..(*state).clone()
        });
        let outcome = run(cold.clone(), turn(session, "Five?")).await;
        assert!(matches!(outcome, Err(ServerError::Unavailable(_))), "{outcome:?}");
        assert_eq!(oracle.calls(), 3);

        // The failed read must not leave a fresh count behind.
        let cached = cold.sessions.get(session).await.unwrap();
        assert!(!cached.hydrated);
        assert_eq!(cached.question_count, 0);
    }
}
