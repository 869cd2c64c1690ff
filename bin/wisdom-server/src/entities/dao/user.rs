use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row in the `users` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    /// SHA-256 digest of the user's current access token.
    #[serde(default)]
    pub token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

/// Activity totals shown on the profile page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub conversations: i64,
    pub messages: i64,
}
