use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
    ConversationStarted,
    UserRegistration,
    MessageLiked,
    ChatSaved,
}

/// A row in the `analytics` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub id: String,
    pub event_type: EventType,
    pub conversation_id: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub message_id: Option<String>,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AnalyticsEvent {
    pub fn new(event_type: EventType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type,
            conversation_id: None,
            user_id: None,
            session_id: None,
            message_id: None,
            data: serde_json::Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }

    pub fn conversation(mut self, id: Option<&str>) -> Self {
        self.conversation_id = id.map(str::to_owned);
        self
    }

    pub fn user(mut self, id: Option<&str>) -> Self {
        self.user_id = id.map(str::to_owned);
        self
    }

    pub fn session(mut self, id: impl ToString) -> Self {
        self.session_id = Some(id.to_string());
        self
    }

    pub fn message(mut self, id: &str) -> Self {
        self.message_id = Some(id.to_owned());
        self
    }

    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// A liked message and its like count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopularMessage {
    pub message_id: String,
    pub like_count: i64,
    pub content: String,
}
