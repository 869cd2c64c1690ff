use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Request body for `POST /api/like`.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LikeRequest {
    #[validate(length(min = 1, max = 64))]
    pub message_id: String,
    /// May be absent when the reply could not be persisted.
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Text of the liked message, kept with the event.
    #[validate(length(max = 8000))]
    #[serde(default)]
    pub message_content: Option<String>,
}

/// Response body for `POST /api/like`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    pub success: bool,
    /// `true` when this session had already liked the message; nothing was recorded.
    pub already_liked: bool,
}
