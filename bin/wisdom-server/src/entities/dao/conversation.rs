use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::language::Language;

/// A row in the `conversations` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    /// `None` until the session is linked to a registered user.
    pub user_id: Option<String>,
    pub session_id: String,
    pub language: Language,
    pub questions_asked: u8,
    #[serde(default)]
    pub is_saved: bool,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
}

/// Partial update of a conversation; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationPatch {
    pub user_id: Option<String>,
    pub language: Option<Language>,
    pub questions_asked: Option<u8>,
    /// Marks the conversation saved at this instant.
    pub saved_at: Option<DateTime<Utc>>,
}

impl ConversationPatch {
    pub fn apply(&self, record: &mut ConversationRecord, now: DateTime<Utc>) {
        if let Some(user_id) = &self.user_id {
            record.user_id = Some(user_id.clone());
        }
        if let Some(language) = self.language {
            record.language = language;
        }
        if let Some(count) = self.questions_asked {
            record.questions_asked = count;
        }
        if let Some(saved_at) = self.saved_at {
            record.is_saved = true;
            record.saved_at = Some(saved_at);
        }
        record.last_message_at = now;
    }
}

/// A saved conversation with a preview of its latest exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedChat {
    pub conversation: ConversationRecord,
    pub last_question: Option<String>,
    pub last_response: Option<String>,
}
