// src/services/deadline.rs

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::PlayerError;

/// Persistence for per-quiz deadlines (epoch milliseconds).
///
/// The store is shared by every session of the same quiz: the first writer
/// wins and later writers must never overwrite an existing deadline.
#[async_trait]
pub trait DeadlineStore: Send + Sync {
    async fn get(&self, quiz_id: i64) -> Result<Option<i64>, PlayerError>;

    /// Stores `deadline_ms` unless a deadline already exists, and returns
    /// whichever value is on disk afterwards.
    async fn set_if_absent(&self, quiz_id: i64, deadline_ms: i64) -> Result<i64, PlayerError>;

    async fn clear(&self, quiz_id: i64) -> Result<(), PlayerError>;
}

#[derive(Debug, Default)]
pub struct MemoryDeadlineStore {
    deadlines: Mutex<HashMap<i64, i64>>,
}

impl MemoryDeadlineStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, i64>> {
        self.deadlines.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DeadlineStore for MemoryDeadlineStore {
    async fn get(&self, quiz_id: i64) -> Result<Option<i64>, PlayerError> {
        Ok(self.lock().get(&quiz_id).copied())
    }

    async fn set_if_absent(&self, quiz_id: i64, deadline_ms: i64) -> Result<i64, PlayerError> {
        Ok(*self.lock().entry(quiz_id).or_insert(deadline_ms))
    }

    async fn clear(&self, quiz_id: i64) -> Result<(), PlayerError> {
        self.lock().remove(&quiz_id);
        Ok(())
    }
}

/// Deadlines in the `quiz_deadlines` table.
#[derive(Debug, Clone)]
pub struct SqliteDeadlineStore {
    pool: SqlitePool,
}

impl SqliteDeadlineStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeadlineStore for SqliteDeadlineStore {
    async fn get(&self, quiz_id: i64) -> Result<Option<i64>, PlayerError> {
        let deadline: Option<i64> =
            sqlx::query_scalar("SELECT deadline_ms FROM quiz_deadlines WHERE quiz_id = ?")
                .bind(quiz_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to read deadline for quiz {}: {:?}", quiz_id, e);
                    PlayerError::from(e)
                })?;

        Ok(deadline)
    }

    async fn set_if_absent(&self, quiz_id: i64, deadline_ms: i64) -> Result<i64, PlayerError> {
        // First writer wins
        let stored: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO quiz_deadlines (quiz_id, deadline_ms)
            VALUES (?, ?)
            ON CONFLICT(quiz_id) DO UPDATE SET deadline_ms = quiz_deadlines.deadline_ms
            RETURNING deadline_ms
            "#,
        )
        .bind(quiz_id)
        .bind(deadline_ms)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to persist deadline for quiz {}: {:?}", quiz_id, e);
            PlayerError::from(e)
        })?;

        Ok(stored)
    }

    async fn clear(&self, quiz_id: i64) -> Result<(), PlayerError> {
        sqlx::query("DELETE FROM quiz_deadlines WHERE quiz_id = ?")
            .bind(quiz_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn sqlite_store() -> SqliteDeadlineStore {
        // A single connection keeps the in-memory database alive and shared.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory sqlite");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to migrate database");

        SqliteDeadlineStore::new(pool)
    }

    async fn first_writer_wins(store: &dyn DeadlineStore) {
        assert_eq!(store.get(7).await.unwrap(), None);
        assert_eq!(store.set_if_absent(7, 1_000).await.unwrap(), 1_000);
        assert_eq!(store.set_if_absent(7, 5_000).await.unwrap(), 1_000);
        assert_eq!(store.get(7).await.unwrap(), Some(1_000));

        store.clear(7).await.unwrap();
        assert_eq!(store.get(7).await.unwrap(), None);
        assert_eq!(store.set_if_absent(7, 5_000).await.unwrap(), 5_000);
    }

    #[tokio::test]
    async fn test_memory_store_first_writer_wins() {
        first_writer_wins(&MemoryDeadlineStore::new()).await;
    }

    #[tokio::test]
    async fn test_sqlite_store_first_writer_wins() {
        first_writer_wins(&sqlite_store().await).await;
    }

    #[tokio::test]
    async fn test_sqlite_store_keys_by_quiz() {
        let store = sqlite_store().await;
        store.set_if_absent(1, 100).await.unwrap();
        store.set_if_absent(2, 200).await.unwrap();
        store.clear(1).await.unwrap();

        assert_eq!(store.get(1).await.unwrap(), None);
        assert_eq!(store.get(2).await.unwrap(), Some(200));
    }
}
