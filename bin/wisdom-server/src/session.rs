//! Per-session conversation state held in the session cache.

use std::collections::HashSet;
use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::language::Language;

/// Client-generated session identifier (the cache key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }

    #[cfg(test)]
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Author of a message in the oracle conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// The answer produced for one chat submission, kept so that a retried
/// submission can be replayed instead of counted again.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub message: String,
    pub question_count: u8,
    pub conversation_id: Option<String>,
    pub message_id: Option<String>,
    pub language: Language,
    pub limit_reached: bool,
    pub fallback: bool,
}

/// The last submission seen for a session.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub key: String,
    pub at: Instant,
    /// `None` while the turn is in flight or if it never completed.
    pub reply: Option<ChatReply>,
}

/// Conversation state for one session.
///
/// `history` holds user/assistant turns only; the system message is rebuilt
/// for every oracle call.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    pub history: Vec<Turn>,
    pub question_count: u8,
    pub user_id: Option<String>,
    pub conversation_id: Option<String>,
    pub language: Language,
    pub liked: HashSet<String>,
    pub last_attempt: Option<Attempt>,
    /// Set once the state has been reconciled with the persisted store.
    pub hydrated: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn session_id_requires_uuid() {
        assert!(SessionId::parse("default-session").is_none());
        let id = SessionId::new_random();
        assert_eq!(SessionId::parse(&id.to_string()), Some(id));
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_value(Turn::assistant("hi")).unwrap();
        assert_eq!(json["role"], "assistant");
    }
}
