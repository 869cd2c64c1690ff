//! The store handlers talk to.
//!
//! Every call goes to the relational store first, bounded by a timeout. When
//! that store is absent, times out or errors, the call is served by the
//! [`FileStore`] instead and a warning is logged. Lookups that come back empty
//! from the relational store are retried against the file store, so rows
//! written during an outage stay visible once the database is back.
//!
//! Session lookups are stricter: a failed database read is only masked when
//! the file store has the row, since an empty answer would reset the
//! session's question count.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::entities::{
    AnalyticsEvent, AnalyticsStore, ConversationPatch, ConversationRecord, ConversationStore, FileStore,
    MessageRecord, MessageStore, PopularMessage, SavedChat, SqlStore, StoreError, UserRecord, UserStats,
    UserStore,
};
use crate::language::Language;

#[derive(Debug)]
pub struct ResilientStore {
    primary: Option<SqlStore>,
    fallback: FileStore,
    timeout: Duration,
}

impl ResilientStore {
    pub fn new(primary: Option<SqlStore>, fallback: FileStore, timeout: Duration) -> Self {
        Self { primary, fallback, timeout }
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    /// Run `call` against the relational store under the timeout.
    ///
    /// `None` when no database is configured.
    async fn attempt<'a, T, F, Fut>(&'a self, op: &'static str, call: F) -> Option<Result<T, StoreError>>
    where
        F: FnOnce(&'a SqlStore) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let store = self.primary.as_ref()?;
        Some(match tokio::time::timeout(self.timeout, call(store)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout { op, after: self.timeout }),
        })
    }

    /// Like [`attempt`](Self::attempt), with failures logged and folded into
    /// `None`, meaning the caller should use the file store.
    async fn primary<'a, T, F, Fut>(&'a self, op: &'static str, call: F) -> Option<T>
    where
        F: FnOnce(&'a SqlStore) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match self.attempt(op, call).await? {
            Ok(value) => Some(value),
            // The row may only exist in the file store.
            Err(StoreError::NotFound(_)) => None,
            Err(e) => {
                warn!(op, error = %e, "relational store failed; using file store");
                None
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn relational(&self) -> Option<&SqlStore> {
        self.primary.as_ref()
    }
}

impl UserStore for ResilientStore {
    async fn upsert_user(&self, email: &str, name: Option<&str>) -> Result<UserRecord, StoreError> {
        match self.primary("upsert_user", |s| s.upsert_user(email, name)).await {
            Some(user) => Ok(user),
            None => self.fallback.upsert_user(email, name).await,
        }
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        match self.primary("get_user", |s| s.get_user(id)).await {
            Some(Some(user)) => Ok(Some(user)),
            _ => self.fallback.get_user(id).await,
        }
    }

    async fn set_token_hash(&self, user_id: &str, token_hash: &str) -> Result<(), StoreError> {
        match self.primary("set_token_hash", |s| s.set_token_hash(user_id, token_hash)).await {
            Some(()) => Ok(()),
            None => self.fallback.set_token_hash(user_id, token_hash).await,
        }
    }

    async fn user_by_token_hash(&self, token_hash: &str) -> Result<Option<UserRecord>, StoreError> {
        match self.primary("user_by_token_hash", |s| s.user_by_token_hash(token_hash)).await {
            Some(Some(user)) => Ok(Some(user)),
            _ => self.fallback.user_by_token_hash(token_hash).await,
        }
    }

    async fn user_stats(&self, user_id: &str) -> Result<UserStats, StoreError> {
        let from_files = self.fallback.user_stats(user_id).await?;
        let from_db = self.primary("user_stats", |s| s.user_stats(user_id)).await.unwrap_or_default();
        Ok(UserStats {
            conversations: from_db.conversations + from_files.conversations,
            messages: from_db.messages + from_files.messages,
        })
    }
}

impl ConversationStore for ResilientStore {
    async fn create_conversation(
        &self,
        user_id: Option<&str>,
        session_id: &str,
        language: Language,
    ) -> Result<ConversationRecord, StoreError> {
        let created = self
            .primary("create_conversation", |s| s.create_conversation(user_id, session_id, language))
            .await;
        match created {
            Some(record) => Ok(record),
            None => self.fallback.create_conversation(user_id, session_id, language).await,
        }
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<ConversationRecord>, StoreError> {
        match self.primary("get_conversation", |s| s.get_conversation(id)).await {
            Some(Some(record)) => Ok(Some(record)),
            _ => self.fallback.get_conversation(id).await,
        }
    }

    async fn conversation_by_session(&self, session_id: &str) -> Result<Option<ConversationRecord>, StoreError> {
        let looked_up = self
            .attempt("conversation_by_session", |s| s.conversation_by_session(session_id))
            .await;
        match looked_up {
            Some(Ok(Some(record))) => Ok(Some(record)),
            Some(Err(e)) if !matches!(e, StoreError::NotFound(_)) => {
                warn!(op = "conversation_by_session", error = %e, "relational store failed; using file store");
                match self.fallback.conversation_by_session(session_id).await? {
                    Some(record) => Ok(Some(record)),
                    // Missing from the files says nothing about the database.
                    None => Err(e),
                }
            }
            _ => self.fallback.conversation_by_session(session_id).await,
        }
    }

    async fn update_conversation(&self, id: &str, patch: &ConversationPatch) -> Result<(), StoreError> {
        match self.primary("update_conversation", |s| s.update_conversation(id, patch)).await {
            Some(()) => Ok(()),
            None => self.fallback.update_conversation(id, patch).await,
        }
    }

    async fn saved_chats(&self, user_id: &str) -> Result<Vec<SavedChat>, StoreError> {
        let mut chats = self.primary("saved_chats", |s| s.saved_chats(user_id)).await.unwrap_or_default();
        chats.extend(self.fallback.saved_chats(user_id).await?);
        chats.sort_by_key(|c| std::cmp::Reverse(c.conversation.saved_at));
        Ok(chats)
    }
}

impl MessageStore for ResilientStore {
    async fn save_message(
        &self,
        conversation_id: &str,
        message: &str,
        is_user: bool,
        language: Language,
    ) -> Result<MessageRecord, StoreError> {
        let saved = self
            .primary("save_message", |s| s.save_message(conversation_id, message, is_user, language))
            .await;
        match saved {
            Some(record) => Ok(record),
            None => self.fallback.save_message(conversation_id, message, is_user, language).await,
        }
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>, StoreError> {
        let mut messages = self
            .primary("list_messages", |s| s.list_messages(conversation_id))
            .await
            .unwrap_or_default();
        messages.extend(self.fallback.list_messages(conversation_id).await?);
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn save_quote(&self, message_id: &str, quote_text: &str, language: Language) -> Result<(), StoreError> {
        match self.primary("save_quote", |s| s.save_quote(message_id, quote_text, language)).await {
            Some(()) => Ok(()),
            None => self.fallback.save_quote(message_id, quote_text, language).await,
        }
    }
}

impl AnalyticsStore for ResilientStore {
    async fn log_event(&self, event: AnalyticsEvent) -> Result<(), StoreError> {
        let copy = event.clone();
        match self.primary("log_event", |s| s.log_event(copy)).await {
            Some(()) => Ok(()),
            None => self.fallback.log_event(event).await,
        }
    }

    async fn liked_message_ids(&self, session_id: &str) -> Result<Vec<String>, StoreError> {
        let mut ids = self
            .primary("liked_message_ids", |s| s.liked_message_ids(session_id))
            .await
            .unwrap_or_default();
        ids.extend(self.fallback.liked_message_ids(session_id).await?);
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn popular_messages(&self, limit: u32) -> Result<Vec<PopularMessage>, StoreError> {
        // Likes of one message can be split across both stores, so rank on
        // the full counts and cut afterwards.
        let mut popular = self
            .primary("popular_messages", |s| s.popular_messages(u32::MAX))
            .await
            .unwrap_or_default();
        for entry in self.fallback.popular_messages(u32::MAX).await? {
            match popular.iter_mut().find(|p| p.message_id == entry.message_id) {
                Some(existing) => existing.like_count += entry.like_count,
                None => popular.push(entry),
            }
        }
        popular.sort_by(|a, b| b.like_count.cmp(&a.like_count).then_with(|| a.message_id.cmp(&b.message_id)));
        popular.truncate(limit as usize);
        Ok(popular)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::{EventType, FileStore};

    async fn file_only(dir: &std::path::Path) -> ResilientStore {
        ResilientStore::new(None, FileStore::open(dir).await.unwrap(), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn without_database_everything_lands_in_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_only(dir.path()).await;
        assert!(!store.has_primary());

        let conv = store.create_conversation(None, "s", Language::English).await.unwrap();
        store.save_message(&conv.id, "hello", true, Language::English).await.unwrap();

        let files = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(files.list_messages(&conv.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lookups_fall_through_to_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = FileStore::open(dir.path()).await.unwrap();
        let offline = files.create_conversation(None, "offline", Language::Hindi).await.unwrap();

        let sql = SqlStore::connect("sqlite::memory:").await.unwrap();
        let store = ResilientStore::new(Some(sql), files, Duration::from_secs(1));
        let online = store.create_conversation(None, "online", Language::English).await.unwrap();

        assert_eq!(store.conversation_by_session("online").await.unwrap().unwrap().id, online.id);
        assert_eq!(store.conversation_by_session("offline").await.unwrap().unwrap().id, offline.id);

        // Updating the file-only row goes through NotFound on the database.
        let patch = ConversationPatch { questions_asked: Some(1), ..Default::default() };
        store.update_conversation(&offline.id, &patch).await.unwrap();
        let updated = store.get_conversation(&offline.id).await.unwrap().unwrap();
        assert_eq!(updated.questions_asked, 1);
    }

    #[tokio::test]
    async fn likes_are_merged_across_stores() {
        let dir = tempfile::tempdir().unwrap();
        let files = FileStore::open(dir.path()).await.unwrap();
        files
            .log_event(AnalyticsEvent::new(EventType::MessageLiked).session("a").message("m"))
            .await
            .unwrap();

        let sql = SqlStore::connect("sqlite::memory:").await.unwrap();
        let store = ResilientStore::new(Some(sql), files, Duration::from_secs(1));
        store
            .log_event(AnalyticsEvent::new(EventType::MessageLiked).session("b").message("m"))
            .await
            .unwrap();

        let popular = store.popular_messages(10).await.unwrap();
        assert_eq!(popular.len(), 1);
        assert_eq!(popular[0].like_count, 2);
        assert_eq!(store.liked_message_ids("a").await.unwrap(), ["m"]);
    }

    #[tokio::test]
    async fn ranking_uses_likes_from_both_stores() {
        let like = |session: &str, message: &str| {
            AnalyticsEvent::new(EventType::MessageLiked).session(session).message(message)
        };
        let dir = tempfile::tempdir().unwrap();
        let files = FileStore::open(dir.path()).await.unwrap();
        // "split" has one like in the files and two in the database; "db" and
        // "file" have two likes each, all in one store.
        for event in [like("a", "split"), like("a", "file"), like("b", "file")] {
            files.log_event(event).await.unwrap();
        }
        let sql = SqlStore::connect("sqlite::memory:").await.unwrap();
        for event in [like("c", "split"), like("c", "db"), like("d", "db")] {
            sql.log_event(event).await.unwrap();
        }
        sql.log_event(like("e", "split")).await.unwrap();

        let store = ResilientStore::new(Some(sql), files, Duration::from_secs(1));
        let top = store.popular_messages(1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].message_id, "split");
        assert_eq!(top[0].like_count, 3);
    }

    #[tokio::test]
    async fn session_lookup_surfaces_database_failure() {
        let dir = tempfile::tempdir().unwrap();
        let files = FileStore::open(dir.path()).await.unwrap();
        let offline = files.create_conversation(None, "offline", Language::English).await.unwrap();
        let sql = SqlStore::connect("sqlite::memory:").await.unwrap();
        let store = ResilientStore::new(Some(sql), files, Duration::from_secs(1));
        store.create_conversation(None, "online", Language::English).await.unwrap();

        store.relational().unwrap().close().await;

        // Rows the files know about are still served.
        let found = store.conversation_by_session("offline").await.unwrap().unwrap();
        assert_eq!(found.id, offline.id);
        // Anything else must not read as a brand-new session.
        assert!(store.conversation_by_session("online").await.is_err());
    }
}
