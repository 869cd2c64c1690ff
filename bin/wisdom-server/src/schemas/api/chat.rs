//! Request / response types for `POST /api/chat`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::language::Language;
use crate::session::ChatReply;
use crate::tracker;

/// Longest accepted message, in characters.
pub const MAX_MESSAGE_CHARS: u64 = 2000;

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The user's question.
    #[validate(length(min = 1, max = MAX_MESSAGE_CHARS))]
    pub message: String,
    /// Links the session to this registered (or new) user.
    #[validate(email)]
    #[serde(default)]
    pub email: Option<String>,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub name: Option<String>,
}

/// Response body for `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message: String,
    /// Questions asked in this session, in `0..=3`.
    pub question_count: u8,
    pub remaining_questions: u8,
    pub limit_reached: bool,
    pub conversation_id: Option<String>,
    /// Id of the stored assistant message; use it to like the reply.
    pub message_id: Option<String>,
    pub language: Language,
    /// `true` when the canned reply stood in for the oracle.
    pub fallback: bool,
}

impl From<ChatReply> for ChatResponse {
    fn from(reply: ChatReply) -> Self {
        Self {
            remaining_questions: tracker::remaining(reply.question_count),
            message: reply.message,
            question_count: reply.question_count,
            limit_reached: reply.limit_reached,
            conversation_id: reply.conversation_id,
            message_id: reply.message_id,
            language: reply.language,
            fallback: reply.fallback,
        }
    }
}
