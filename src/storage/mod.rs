//! Storage backend contract.
//!
//! The façade never owns item state: every read and write goes through a
//! `StorageBackend`, which is also the only place where conditional-write
//! checks are enforced.

mod memory;

pub use memory::*;

use async_trait::async_trait;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors reported by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No such item, or no items at all in the collection.
    #[error("not found")]
    NotFound,

    /// The stored item changed after the caller's `X-If-Unmodified-Since`.
    #[error("item modified at {current}, after the requested precondition")]
    PreconditionFailed { current: i64 },

    /// The backend itself failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// One stored item in its storage envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredItem {
    pub id: String,
    /// JSON-encoded record.
    pub payload: String,
    /// Server time of the last write, in milliseconds since the epoch.
    pub modified_at: i64,
}

/// Parameters of a single write.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Timestamp to stamp the item with.
    pub modified_at: i64,
    /// Reject the write if the stored item is newer than this.
    pub if_unmodified_since: Option<i64>,
}

/// Result of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutOutcome {
    pub modified_at: i64,
    /// True when no item existed under this id before the write.
    pub created: bool,
}

/// Generic per-user item storage, keyed by collection and item id.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Items in a collection, oldest first, optionally only those modified
    /// strictly after `newer_than`.
    async fn list_items(
        &self,
        user_id: u64,
        collection: &str,
        newer_than: Option<i64>,
    ) -> StorageResult<Vec<StoredItem>>;

    async fn get_item(&self, user_id: u64, collection: &str, item_id: &str)
        -> StorageResult<StoredItem>;

    async fn put_item(
        &self,
        user_id: u64,
        collection: &str,
        item_id: &str,
        payload: &str,
        options: WriteOptions,
    ) -> StorageResult<PutOutcome>;

    async fn delete_item(
        &self,
        user_id: u64,
        collection: &str,
        item_id: &str,
        if_unmodified_since: Option<i64>,
    ) -> StorageResult<()>;

    /// Latest modification time of any item in the collection.
    async fn collection_timestamp(&self, user_id: u64, collection: &str)
        -> StorageResult<Option<i64>>;
}

/// Shared precondition rule for writes and deletes.
pub fn check_unmodified_since(current: i64, if_unmodified_since: Option<i64>) -> StorageResult<()> {
    match if_unmodified_since {
        Some(limit) if current > limit => Err(StorageError::PreconditionFailed { current }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmodified_since_rule() {
        assert!(check_unmodified_since(100, None).is_ok());
        assert!(check_unmodified_since(100, Some(100)).is_ok());
        assert!(check_unmodified_since(100, Some(101)).is_ok());
        assert!(matches!(
            check_unmodified_since(100, Some(99)),
            Err(StorageError::PreconditionFailed { current: 100 })
        ));
        assert!(check_unmodified_since(100, Some(0)).is_err());
    }
}
