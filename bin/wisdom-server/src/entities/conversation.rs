use chrono::Utc;
use std::future::Future;

use crate::entities::{
    ConversationPatch, ConversationRecord, SavedChat, SqlStore, StoreError, new_id, parse_language,
    parse_ts, ts,
};
use crate::language::Language;

pub trait ConversationStore: Send + Sync + 'static {
    fn create_conversation(
        &self,
        user_id: Option<&str>,
        session_id: &str,
        language: Language,
    ) -> impl Future<Output = Result<ConversationRecord, StoreError>> + Send;
    fn get_conversation(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<ConversationRecord>, StoreError>> + Send;
    fn conversation_by_session(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Option<ConversationRecord>, StoreError>> + Send;
    fn update_conversation(
        &self,
        id: &str,
        patch: &ConversationPatch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
    /// Saved conversations of `user_id`, most recently saved first.
    fn saved_chats(&self, user_id: &str) -> impl Future<Output = Result<Vec<SavedChat>, StoreError>> + Send;
}

type ConversationRow = (String, Option<String>, String, String, i64, i64, Option<String>, String, String);

const CONVERSATION_COLUMNS: &str =
    "id, user_id, session_id, language, questions_asked, is_saved, saved_at, created_at, last_message_at";

fn conversation_from_row(
    (id, user_id, session_id, language, questions_asked, is_saved, saved_at, created_at, last_message_at): ConversationRow,
) -> ConversationRecord {
    ConversationRecord {
        id,
        user_id,
        session_id,
        language: parse_language(&language),
        questions_asked: u8::try_from(questions_asked).unwrap_or(u8::MAX),
        is_saved: is_saved != 0,
        saved_at: saved_at.as_deref().map(parse_ts),
        created_at: parse_ts(&created_at),
        last_message_at: parse_ts(&last_message_at),
    }
}

impl ConversationStore for SqlStore {
    async fn create_conversation(
        &self,
        user_id: Option<&str>,
        session_id: &str,
        language: Language,
    ) -> Result<ConversationRecord, StoreError> {
        let now = Utc::now();
        let record = ConversationRecord {
            id: new_id(),
            user_id: user_id.map(str::to_owned),
            session_id: session_id.to_owned(),
            language,
            questions_asked: 0,
            is_saved: false,
            saved_at: None,
            created_at: now,
            last_message_at: now,
        };
        sqlx::query(
            "INSERT INTO conversations (id, user_id, session_id, language, questions_asked, is_saved, created_at, last_message_at) \
             VALUES (?1, ?2, ?3, ?4, 0, 0, ?5, ?5)",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.session_id)
        .bind(language.to_string())
        .bind(ts(now))
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<ConversationRecord>, StoreError> {
        let row: Option<ConversationRow> =
            sqlx::query_as(&format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(conversation_from_row))
    }

    async fn conversation_by_session(&self, session_id: &str) -> Result<Option<ConversationRecord>, StoreError> {
        let row: Option<ConversationRow> =
            sqlx::query_as(&format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE session_id = ?1"))
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(conversation_from_row))
    }

    async fn update_conversation(&self, id: &str, patch: &ConversationPatch) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE conversations SET \
               user_id = COALESCE(?1, user_id), \
               language = COALESCE(?2, language), \
               questions_asked = COALESCE(?3, questions_asked), \
               is_saved = CASE WHEN ?4 IS NULL THEN is_saved ELSE 1 END, \
               saved_at = COALESCE(?4, saved_at), \
               last_message_at = ?5 \
             WHERE id = ?6",
        )
        .bind(&patch.user_id)
        .bind(patch.language.map(|l| l.to_string()))
        .bind(patch.questions_asked.map(i64::from))
        .bind(patch.saved_at.map(ts))
        .bind(ts(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("conversation {id}")));
        }
        Ok(())
    }

    async fn saved_chats(&self, user_id: &str) -> Result<Vec<SavedChat>, StoreError> {
        type SavedRow = (
            String,
            Option<String>,
            String,
            String,
            i64,
            i64,
            Option<String>,
            String,
            String,
            Option<String>,
            Option<String>,
        );
        let rows: Vec<SavedRow> = sqlx::query_as(&format!(
            "SELECT {CONVERSATION_COLUMNS}, \
               (SELECT message FROM messages WHERE conversation_id = c.id AND is_user = 1 \
                 ORDER BY created_at DESC, rowid DESC LIMIT 1), \
               (SELECT message FROM messages WHERE conversation_id = c.id AND is_user = 0 \
                 ORDER BY created_at DESC, rowid DESC LIMIT 1) \
             FROM conversations c WHERE user_id = ?1 AND is_saved = 1 \
             ORDER BY saved_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, user_id, session_id, language, asked, saved, saved_at, created_at, last, question, response)| {
                SavedChat {
                    conversation: conversation_from_row((
                        id, user_id, session_id, language, asked, saved, saved_at, created_at, last,
                    )),
                    last_question: question,
                    last_response: response,
                }
            })
            .collect())
    }
}
