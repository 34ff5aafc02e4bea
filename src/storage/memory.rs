//! In-process storage backend.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    check_unmodified_since, PutOutcome, StorageBackend, StorageError, StorageResult, StoredItem,
    WriteOptions,
};

type CollectionKey = (u64, String);

/// Volatile storage held in memory; contents are lost on restart.
#[derive(Default)]
pub struct MemoryStorage {
    collections: RwLock<HashMap<CollectionKey, BTreeMap<String, StoredItem>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn list_items(
        &self,
        user_id: u64,
        collection: &str,
        newer_than: Option<i64>,
    ) -> StorageResult<Vec<StoredItem>> {
        let collections = self.collections.read().await;
        let items = collections
            .get(&(user_id, collection.to_string()))
            .filter(|items| !items.is_empty())
            .ok_or(StorageError::NotFound)?;

        let mut listed: Vec<StoredItem> = items
            .values()
            .filter(|item| newer_than.map_or(true, |after| item.modified_at > after))
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.modified_at.cmp(&b.modified_at).then_with(|| a.id.cmp(&b.id)));
        Ok(listed)
    }

    async fn get_item(
        &self,
        user_id: u64,
        collection: &str,
        item_id: &str,
    ) -> StorageResult<StoredItem> {
        let collections = self.collections.read().await;
        collections
            .get(&(user_id, collection.to_string()))
            .and_then(|items| items.get(item_id))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn put_item(
        &self,
        user_id: u64,
        collection: &str,
        item_id: &str,
        payload: &str,
        options: WriteOptions,
    ) -> StorageResult<PutOutcome> {
        let mut collections = self.collections.write().await;
        let items = collections
            .entry((user_id, collection.to_string()))
            .or_default();

        let created = match items.get(item_id) {
            Some(existing) => {
                check_unmodified_since(existing.modified_at, options.if_unmodified_since)?;
                false
            }
            None => true,
        };

        items.insert(
            item_id.to_string(),
            StoredItem {
                id: item_id.to_string(),
                payload: payload.to_string(),
                modified_at: options.modified_at,
            },
        );

        Ok(PutOutcome {
            modified_at: options.modified_at,
            created,
        })
    }

    async fn delete_item(
        &self,
        user_id: u64,
        collection: &str,
        item_id: &str,
        if_unmodified_since: Option<i64>,
    ) -> StorageResult<()> {
        let mut collections = self.collections.write().await;
        let items = collections
            .get_mut(&(user_id, collection.to_string()))
            .ok_or(StorageError::NotFound)?;
        let existing = items.get(item_id).ok_or(StorageError::NotFound)?;
        check_unmodified_since(existing.modified_at, if_unmodified_since)?;
        items.remove(item_id);
        Ok(())
    }

    async fn collection_timestamp(
        &self,
        user_id: u64,
        collection: &str,
    ) -> StorageResult<Option<i64>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&(user_id, collection.to_string()))
            .and_then(|items| items.values().map(|item| item.modified_at).max()))
    }
}
