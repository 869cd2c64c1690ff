//! JSON-file implementation of the store traits.
//!
//! Each table is one JSON array in the data directory, loaded at startup and
//! rewritten (temp file + rename) after every mutation. A mutation is made on
//! a copy of the table and only becomes visible once the file is written. All
//! access goes through one async mutex, which also serialises the file writes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::info;

use crate::entities::dao::QuoteRecord;
use crate::entities::message::new_message;
use crate::entities::{
    AnalyticsEvent, AnalyticsStore, ConversationPatch, ConversationRecord, ConversationStore, EventType,
    MessageRecord, MessageStore, PopularMessage, SavedChat, StoreError, UserRecord, UserStats, UserStore,
    new_id,
};
use crate::language::Language;

const USERS: &str = "users.json";
const CONVERSATIONS: &str = "conversations.json";
const MESSAGES: &str = "messages.json";
const QUOTES: &str = "quotes.json";
const ANALYTICS: &str = "analytics.json";

#[derive(Debug, Default)]
struct Tables {
    users: Vec<UserRecord>,
    conversations: Vec<ConversationRecord>,
    messages: Vec<MessageRecord>,
    quotes: Vec<QuoteRecord>,
    analytics: Vec<AnalyticsEvent>,
}

#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    tables: Mutex<Tables>,
}

impl FileStore {
    /// Open the store in `dir`, creating the directory if needed.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        let tables = Tables {
            users: load(&dir, USERS).await?,
            conversations: load(&dir, CONVERSATIONS).await?,
            messages: load(&dir, MESSAGES).await?,
            quotes: load(&dir, QUOTES).await?,
            analytics: load(&dir, ANALYTICS).await?,
        };
        info!(
            dir = %dir.display(),
            users = tables.users.len(),
            conversations = tables.conversations.len(),
            messages = tables.messages.len(),
            "file store loaded"
        );
        Ok(Self { dir, tables: Mutex::new(tables) })
    }

    /// Apply `change` to a copy of `table`, write it out, then keep it.
    async fn mutate<T, R>(
        &self,
        name: &str,
        table: &mut Vec<T>,
        change: impl FnOnce(&mut Vec<T>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError>
    where
        T: Clone + Serialize,
    {
        let mut next = table.clone();
        let out = change(&mut next)?;
        self.persist(name, &next).await?;
        *table = next;
        Ok(out)
    }

    async fn persist<T: Serialize>(&self, name: &str, rows: &[T]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(rows)?;
        let target = self.dir.join(name);
        let tmp = self.dir.join(format!("{name}.tmp"));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &target).await?;
        Ok(())
    }
}

async fn load<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<Vec<T>, StoreError> {
    match tokio::fs::read(dir.join(name)).await {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

impl UserStore for FileStore {
    async fn upsert_user(&self, email: &str, name: Option<&str>) -> Result<UserRecord, StoreError> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        self.mutate(USERS, &mut tables.users, |users| {
            Ok(match users.iter_mut().find(|u| u.email == email) {
                Some(user) => {
                    if let Some(name) = name {
                        user.name = Some(name.to_owned());
                    }
                    user.last_active = now;
                    user.clone()
                }
                None => {
                    let user = UserRecord {
                        id: new_id(),
                        email: email.to_owned(),
                        name: name.map(str::to_owned),
                        token_hash: None,
                        created_at: now,
                        last_active: now,
                    };
                    users.push(user.clone());
                    user
                }
            })
        })
        .await
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn set_token_hash(&self, user_id: &str, token_hash: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        self.mutate(USERS, &mut tables.users, |users| {
            let user = users
                .iter_mut()
                .find(|u| u.id == user_id)
                .ok_or_else(|| StoreError::NotFound(format!("user {user_id}")))?;
            user.token_hash = Some(token_hash.to_owned());
            Ok(())
        })
        .await
    }

    async fn user_by_token_hash(&self, token_hash: &str) -> Result<Option<UserRecord>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.token_hash.as_deref() == Some(token_hash))
            .cloned())
    }

    async fn user_stats(&self, user_id: &str) -> Result<UserStats, StoreError> {
        let tables = self.tables.lock().await;
        let owned: Vec<&str> = tables
            .conversations
            .iter()
            .filter(|c| c.user_id.as_deref() == Some(user_id))
            .map(|c| c.id.as_str())
            .collect();
        let messages = tables
            .messages
            .iter()
            .filter(|m| owned.contains(&m.conversation_id.as_str()))
            .count();
        Ok(UserStats {
            conversations: owned.len() as i64,
            messages: messages as i64,
        })
    }
}

impl ConversationStore for FileStore {
    async fn create_conversation(
        &self,
        user_id: Option<&str>,
        session_id: &str,
        language: Language,
    ) -> Result<ConversationRecord, StoreError> {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables.conversations.iter().find(|c| c.session_id == session_id) {
            return Ok(existing.clone());
        }
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
        self.mutate(CONVERSATIONS, &mut tables.conversations, |rows| {
            rows.push(record.clone());
            Ok(())
        })
        .await?;
        Ok(record)
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<ConversationRecord>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.conversations.iter().find(|c| c.id == id).cloned())
    }

    async fn conversation_by_session(&self, session_id: &str) -> Result<Option<ConversationRecord>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.conversations.iter().find(|c| c.session_id == session_id).cloned())
    }

    async fn update_conversation(&self, id: &str, patch: &ConversationPatch) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        self.mutate(CONVERSATIONS, &mut tables.conversations, |rows| {
            let record = rows
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| StoreError::NotFound(format!("conversation {id}")))?;
            patch.apply(record, Utc::now());
            Ok(())
        })
        .await
    }

    async fn saved_chats(&self, user_id: &str) -> Result<Vec<SavedChat>, StoreError> {
        let tables = self.tables.lock().await;
        let mut saved: Vec<&ConversationRecord> = tables
            .conversations
            .iter()
            .filter(|c| c.is_saved && c.user_id.as_deref() == Some(user_id))
            .collect();
        saved.sort_by_key(|c| std::cmp::Reverse(c.saved_at.unwrap_or(c.created_at)));

        let latest = |conversation_id: &str, is_user: bool| {
            tables
                .messages
                .iter()
                .filter(|m| m.conversation_id == conversation_id && m.is_user == is_user)
                .last()
                .map(|m| m.message.clone())
        };
        Ok(saved
            .into_iter()
            .map(|c| SavedChat {
                last_question: latest(&c.id, true),
                last_response: latest(&c.id, false),
                conversation: c.clone(),
            })
            .collect())
    }
}

impl MessageStore for FileStore {
    async fn save_message(
        &self,
        conversation_id: &str,
        message: &str,
        is_user: bool,
        language: Language,
    ) -> Result<MessageRecord, StoreError> {
        let record = new_message(conversation_id, message, is_user, language);
        let mut tables = self.tables.lock().await;
        self.mutate(MESSAGES, &mut tables.messages, |rows| {
            rows.push(record.clone());
            Ok(())
        })
        .await?;
        Ok(record)
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn save_quote(&self, message_id: &str, quote_text: &str, language: Language) -> Result<(), StoreError> {
        let quote = QuoteRecord {
            id: new_id(),
            message_id: message_id.to_owned(),
            quote_text: quote_text.to_owned(),
            language,
            created_at: Utc::now(),
        };
        let mut tables = self.tables.lock().await;
        self.mutate(QUOTES, &mut tables.quotes, |rows| {
            rows.push(quote);
            Ok(())
        })
        .await
    }
}

impl AnalyticsStore for FileStore {
    async fn log_event(&self, event: AnalyticsEvent) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        self.mutate(ANALYTICS, &mut tables.analytics, |rows| {
            rows.push(event);
            Ok(())
        })
        .await
    }

    async fn liked_message_ids(&self, session_id: &str) -> Result<Vec<String>, StoreError> {
        let tables = self.tables.lock().await;
        let mut ids: Vec<String> = tables
            .analytics
            .iter()
            .filter(|e| e.event_type == EventType::MessageLiked && e.session_id.as_deref() == Some(session_id))
            .filter_map(|e| e.message_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn popular_messages(&self, limit: u32) -> Result<Vec<PopularMessage>, StoreError> {
        let tables = self.tables.lock().await;
        let mut counts: HashMap<&str, (i64, Option<&str>)> = HashMap::new();
        for event in tables.analytics.iter().filter(|e| e.event_type == EventType::MessageLiked) {
            let Some(message_id) = event.message_id.as_deref() else { continue };
            let slot = counts.entry(message_id).or_insert((0, None));
            slot.0 += 1;
            if slot.1.is_none() {
                slot.1 = event.data.get("message_content").and_then(|v| v.as_str());
            }
        }
        let mut popular: Vec<PopularMessage> = counts
            .into_iter()
            .map(|(message_id, (like_count, liked_content))| {
                let stored = tables.messages.iter().find(|m| m.id == message_id).map(|m| m.message.as_str());
                PopularMessage {
                    message_id: message_id.to_owned(),
                    like_count,
                    content: stored.or(liked_content).unwrap_or_default().to_owned(),
                }
            })
            .collect();
        popular.sort_by(|a, b| b.like_count.cmp(&a.like_count).then_with(|| a.message_id.cmp(&b.message_id)));
        popular.truncate(limit as usize);
        Ok(popular)
    }
}
