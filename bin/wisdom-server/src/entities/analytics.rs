use std::future::Future;

use crate::entities::{AnalyticsEvent, EventType, PopularMessage, SqlStore, StoreError, ts};

pub trait AnalyticsStore: Send + Sync + 'static {
    fn log_event(&self, event: AnalyticsEvent) -> impl Future<Output = Result<(), StoreError>> + Send;
    /// Message ids already liked from `session_id`.
    fn liked_message_ids(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;
    /// Most liked messages, highest like count first.
    fn popular_messages(
        &self,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<PopularMessage>, StoreError>> + Send;
}

impl AnalyticsStore for SqlStore {
    async fn log_event(&self, event: AnalyticsEvent) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO analytics (id, event_type, conversation_id, user_id, session_id, message_id, data, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&event.id)
        .bind(event.event_type.to_string())
        .bind(&event.conversation_id)
        .bind(&event.user_id)
        .bind(&event.session_id)
        .bind(&event.message_id)
        .bind(event.data.to_string())
        .bind(ts(event.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn liked_message_ids(&self, session_id: &str) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT message_id FROM analytics \
             WHERE session_id = ?1 AND event_type = ?2 AND message_id IS NOT NULL",
        )
        .bind(session_id)
        .bind(EventType::MessageLiked.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn popular_messages(&self, limit: u32) -> Result<Vec<PopularMessage>, StoreError> {
        let rows: Vec<(String, i64, String)> = sqlx::query_as(
            "SELECT a.message_id, COUNT(*) AS likes, \
                    COALESCE(MAX(m.message), MAX(json_extract(a.data, '$.message_content')), '') \
             FROM analytics a LEFT JOIN messages m ON m.id = a.message_id \
             WHERE a.event_type = ?1 AND a.message_id IS NOT NULL \
             GROUP BY a.message_id \
             ORDER BY likes DESC, MAX(a.created_at) DESC \
             LIMIT ?2",
        )
        .bind(EventType::MessageLiked.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(message_id, like_count, content)| PopularMessage { message_id, like_count, content })
            .collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn like(session: &str, message: &str, content: &str) -> AnalyticsEvent {
        AnalyticsEvent::new(EventType::MessageLiked)
            .session(session)
            .message(message)
            .data(json!({ "message_content": content }))
    }

    #[tokio::test]
    async fn popular_messages_ranked_by_likes() {
        let store = SqlStore::connect("sqlite::memory:").await.unwrap();
        store.log_event(like("s1", "m1", "Have faith.")).await.unwrap();
        store.log_event(like("s2", "m1", "Have faith.")).await.unwrap();
        store.log_event(like("s1", "m2", "Meditate daily.")).await.unwrap();
        store.log_event(AnalyticsEvent::new(EventType::ChatSaved)).await.unwrap();

        let popular = store.popular_messages(10).await.unwrap();
        assert_eq!(popular.len(), 2);
        assert_eq!(popular[0], PopularMessage {
            message_id: "m1".into(),
            like_count: 2,
            content: "Have faith.".into()
        });
        assert_eq!(store.popular_messages(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn liked_ids_are_per_session() {
        let store = SqlStore::connect("sqlite::memory:").await.unwrap();
        store.log_event(like("s1", "m1", "")).await.unwrap();
        store.log_event(like("s2", "m2", "")).await.unwrap();
        assert_eq!(store.liked_message_ids("s1").await.unwrap(), vec!["m1".to_owned()]);
    }
}
