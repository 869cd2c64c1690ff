use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::language::Language;

/// A row in the `messages` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub conversation_id: String,
    pub message: String,
    pub is_user: bool,
    pub detected_language: Language,
    #[serde(default)]
    pub contains_quote: bool,
    pub created_at: DateTime<Utc>,
}

/// A row in the `quotes` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub id: String,
    pub message_id: String,
    pub quote_text: String,
    pub language: Language,
    pub created_at: DateTime<Utc>,
}
