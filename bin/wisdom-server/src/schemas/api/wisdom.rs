use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::entities::PopularMessage;

/// Query parameters for `GET /api/popular-wisdom`.
#[derive(Debug, Clone, Default, Deserialize, Validate, IntoParams, ToSchema)]
pub struct PopularQuery {
    /// Number of messages to return (default `10`, at most `50`).
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PopularMessageView {
    pub message_id: String,
    pub like_count: i64,
    pub content: String,
}

impl From<PopularMessage> for PopularMessageView {
    fn from(p: PopularMessage) -> Self {
        Self { message_id: p.message_id, like_count: p.like_count, content: p.content }
    }
}

/// Response body for `GET /api/popular-wisdom`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PopularWisdomResponse {
    pub success: bool,
    pub messages: Vec<PopularMessageView>,
}
