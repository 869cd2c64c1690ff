use chrono::Utc;
use std::future::Future;

use crate::entities::{MessageRecord, SqlStore, StoreError, new_id, parse_language, parse_ts, ts};
use crate::language::Language;
use crate::wisdom;

pub trait MessageStore: Send + Sync + 'static {
    fn save_message(
        &self,
        conversation_id: &str,
        message: &str,
        is_user: bool,
        language: Language,
    ) -> impl Future<Output = Result<MessageRecord, StoreError>> + Send;
    /// Messages of a conversation in chronological order.
    fn list_messages(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<Vec<MessageRecord>, StoreError>> + Send;
    fn save_quote(
        &self,
        message_id: &str,
        quote_text: &str,
        language: Language,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Build a new message row; assistant messages are flagged when they carry a
/// Gita quote.
pub(crate) fn new_message(conversation_id: &str, message: &str, is_user: bool, language: Language) -> MessageRecord {
    MessageRecord {
        id: new_id(),
        conversation_id: conversation_id.to_owned(),
        message: message.to_owned(),
        is_user,
        detected_language: language,
        contains_quote: !is_user && wisdom::extract_quote(message).is_some(),
        created_at: Utc::now(),
    }
}

type MessageRow = (String, String, String, i64, String, i64, String);

impl MessageStore for SqlStore {
    async fn save_message(
        &self,
        conversation_id: &str,
        message: &str,
        is_user: bool,
        language: Language,
    ) -> Result<MessageRecord, StoreError> {
        let record = new_message(conversation_id, message, is_user, language);
        sqlx::query(
            "INSERT INTO messages (id, conversation_id, message, is_user, detected_language, contains_quote, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&record.id)
        .bind(&record.conversation_id)
        .bind(&record.message)
        .bind(record.is_user)
        .bind(language.to_string())
        .bind(record.contains_quote)
        .bind(ts(record.created_at))
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>, StoreError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, conversation_id, message, is_user, detected_language, contains_quote, created_at \
             FROM messages WHERE conversation_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, conversation_id, message, is_user, language, contains_quote, created_at)| MessageRecord {
                id,
                conversation_id,
                message,
                is_user: is_user != 0,
                detected_language: parse_language(&language),
                contains_quote: contains_quote != 0,
                created_at: parse_ts(&created_at),
            })
            .collect())
    }

    async fn save_quote(&self, message_id: &str, quote_text: &str, language: Language) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO quotes (id, message_id, quote_text, language, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(new_id())
        .bind(message_id)
        .bind(quote_text)
        .bind(language.to_string())
        .bind(ts(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
