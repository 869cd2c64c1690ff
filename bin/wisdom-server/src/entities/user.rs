use chrono::Utc;
use std::future::Future;

use crate::entities::{SqlStore, StoreError, UserRecord, UserStats, new_id, parse_ts, ts};

pub trait UserStore: Send + Sync + 'static {
    /// Create the user for `email`, or refresh `name`/`last_active` if it exists.
    fn upsert_user(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> impl Future<Output = Result<UserRecord, StoreError>> + Send;
    fn get_user(&self, id: &str) -> impl Future<Output = Result<Option<UserRecord>, StoreError>> + Send;
    fn set_token_hash(
        &self,
        user_id: &str,
        token_hash: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
    fn user_by_token_hash(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, StoreError>> + Send;
    fn user_stats(&self, user_id: &str) -> impl Future<Output = Result<UserStats, StoreError>> + Send;
}

type UserRow = (String, String, Option<String>, Option<String>, String, String);

const USER_COLUMNS: &str = "id, email, name, token_hash, created_at, last_active";

fn user_from_row((id, email, name, token_hash, created_at, last_active): UserRow) -> UserRecord {
    UserRecord {
        id,
        email,
        name,
        token_hash,
        created_at: parse_ts(&created_at),
        last_active: parse_ts(&last_active),
    }
}

impl UserStore for SqlStore {
    async fn upsert_user(&self, email: &str, name: Option<&str>) -> Result<UserRecord, StoreError> {
        let now = ts(Utc::now());
        sqlx::query(
            "INSERT INTO users (id, email, name, created_at, last_active) VALUES (?1, ?2, ?3, ?4, ?4) \
             ON CONFLICT(email) DO UPDATE SET name = COALESCE(?3, users.name), last_active = ?4",
        )
        .bind(new_id())
        .bind(email)
        .bind(name)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let row: UserRow = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(user_from_row(row))
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(user_from_row))
    }

    async fn set_token_hash(&self, user_id: &str, token_hash: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET token_hash = ?1 WHERE id = ?2")
            .bind(token_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    async fn user_by_token_hash(&self, token_hash: &str) -> Result<Option<UserRecord>, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE token_hash = ?1"))
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(user_from_row))
    }

    async fn user_stats(&self, user_id: &str) -> Result<UserStats, StoreError> {
        let (conversations, messages): (i64, i64) = sqlx::query_as(
            "SELECT \
               (SELECT COUNT(*) FROM conversations WHERE user_id = ?1), \
               (SELECT COUNT(*) FROM messages m JOIN conversations c ON c.id = m.conversation_id \
                 WHERE c.user_id = ?1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(UserStats { conversations, messages })
    }
}
