use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::{UserRecord, UserStats};

/// Request body for `POST /api/register`.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub name: Option<String>,
    /// Session whose conversation should be linked to the user.
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}

impl From<UserRecord> for UserView {
    fn from(user: UserRecord) -> Self {
        Self { id: user.id, email: user.email, name: user.name }
    }
}

/// Response body for `POST /api/register`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub success: bool,
    pub user: UserView,
    /// Bearer token for the authenticated endpoints. Only shown once.
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub joined_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub conversations: i64,
    pub messages: i64,
}

impl ProfileView {
    pub fn new(user: UserRecord, stats: UserStats) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            joined_at: user.created_at,
            last_active: user.last_active,
            conversations: stats.conversations,
            messages: stats.messages,
        }
    }
}

/// Response body for `GET /api/profile`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub success: bool,
    pub user: ProfileView,
}
