//! SQLite-backed item storage.
//!
//! Conditional writes read the current timestamp and write inside one
//! transaction, so the precondition holds at commit time.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::storage::{
    check_unmodified_since, PutOutcome, StorageBackend, StorageError, StorageResult, StoredItem,
    WriteOptions,
};

/// Database repository implementing the storage backend.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn collection_exists(&self, user_id: u64, collection: &str) -> StorageResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM items WHERE user_id = ? AND collection = ?)",
        )
        .bind(user_id as i64)
        .bind(collection)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

#[async_trait]
impl StorageBackend for Repository {
    async fn list_items(
        &self,
        user_id: u64,
        collection: &str,
        newer_than: Option<i64>,
    ) -> StorageResult<Vec<StoredItem>> {
        if !self.collection_exists(user_id, collection).await? {
            return Err(StorageError::NotFound);
        }

        let rows = sqlx::query(
            "SELECT item_id, payload, modified_at FROM items \
             WHERE user_id = ? AND collection = ? AND (? IS NULL OR modified_at > ?) \
             ORDER BY modified_at, item_id",
        )
        .bind(user_id as i64)
        .bind(collection)
        .bind(newer_than)
        .bind(newer_than)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(item_from_row).collect())
    }

    async fn get_item(
        &self,
        user_id: u64,
        collection: &str,
        item_id: &str,
    ) -> StorageResult<StoredItem> {
        let row = sqlx::query(
            "SELECT item_id, payload, modified_at FROM items \
             WHERE user_id = ? AND collection = ? AND item_id = ?",
        )
        .bind(user_id as i64)
        .bind(collection)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(item_from_row).ok_or(StorageError::NotFound)
    }

    async fn put_item(
        &self,
        user_id: u64,
        collection: &str,
        item_id: &str,
        payload: &str,
        options: WriteOptions,
    ) -> StorageResult<PutOutcome> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> = sqlx::query_scalar(
            "SELECT modified_at FROM items WHERE user_id = ? AND collection = ? AND item_id = ?",
        )
        .bind(user_id as i64)
        .bind(collection)
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(current) = current {
            check_unmodified_since(current, options.if_unmodified_since)?;
        }

        sqlx::query(
            "INSERT INTO items (user_id, collection, item_id, payload, modified_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(user_id, collection, item_id) \
             DO UPDATE SET payload = excluded.payload, modified_at = excluded.modified_at",
        )
        .bind(user_id as i64)
        .bind(collection)
        .bind(item_id)
        .bind(payload)
        .bind(options.modified_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(PutOutcome {
            modified_at: options.modified_at,
            created: current.is_none(),
        })
    }

    async fn delete_item(
        &self,
        user_id: u64,
        collection: &str,
        item_id: &str,
        if_unmodified_since: Option<i64>,
    ) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> = sqlx::query_scalar(
            "SELECT modified_at FROM items WHERE user_id = ? AND collection = ? AND item_id = ?",
        )
        .bind(user_id as i64)
        .bind(collection)
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?;

        let current = current.ok_or(StorageError::NotFound)?;
        check_unmodified_since(current, if_unmodified_since)?;

        sqlx::query("DELETE FROM items WHERE user_id = ? AND collection = ? AND item_id = ?")
            .bind(user_id as i64)
            .bind(collection)
            .bind(item_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn collection_timestamp(
        &self,
        user_id: u64,
        collection: &str,
    ) -> StorageResult<Option<i64>> {
        let latest: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(modified_at) FROM items WHERE user_id = ? AND collection = ?",
        )
        .bind(user_id as i64)
        .bind(collection)
        .fetch_one(&self.pool)
        .await?;
        Ok(latest)
    }
}

// Helper functions for row conversion

fn item_from_row(row: &sqlx::sqlite::SqliteRow) -> StoredItem {
    StoredItem {
        id: row.get("item_id"),
        payload: row.get("payload"),
        modified_at: row.get("modified_at"),
    }
}
