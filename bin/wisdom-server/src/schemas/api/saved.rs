//! Request / response types for saved conversations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::{MessageRecord, SavedChat};
use crate::language::Language;

/// Request body for `POST /api/save-chat`.
///
/// One of `sessionId` or `conversationId` identifies the conversation;
/// `conversationId` wins when both are given.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveChatRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Informational, as reported by the client.
    #[serde(default)]
    pub message_count: Option<u32>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Response body for `POST /api/save-chat`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveChatResponse {
    pub success: bool,
    pub message: String,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SavedChatView {
    pub id: String,
    pub language: Language,
    pub created_at: DateTime<Utc>,
    pub saved_at: Option<DateTime<Utc>>,
    pub questions_asked: u8,
    pub last_question: Option<String>,
    pub last_response: Option<String>,
}

impl From<SavedChat> for SavedChatView {
    fn from(chat: SavedChat) -> Self {
        let c = chat.conversation;
        Self {
            id: c.id,
            language: c.language,
            created_at: c.created_at,
            saved_at: c.saved_at,
            questions_asked: c.questions_asked,
            last_question: chat.last_question,
            last_response: chat.last_response,
        }
    }
}

/// Response body for `GET /api/saved-chats`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SavedChatsResponse {
    pub success: bool,
    pub chats: Vec<SavedChatView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub message: String,
    pub is_user: bool,
    pub language: Language,
    pub contains_quote: bool,
    pub created_at: DateTime<Utc>,
}

impl From<MessageRecord> for MessageView {
    fn from(m: MessageRecord) -> Self {
        Self {
            id: m.id,
            message: m.message,
            is_user: m.is_user,
            language: m.detected_language,
            contains_quote: m.contains_quote,
            created_at: m.created_at,
        }
    }
}

/// Response body for `GET /api/conversations/{id}/messages`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessagesResponse {
    pub success: bool,
    pub conversation_id: String,
    pub messages: Vec<MessageView>,
}
