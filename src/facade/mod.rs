//! Collection façade.
//!
//! Speaks the apps/devices protocol on top of a generic item store: parses
//! and validates uploads, derives and checks item ids, and shapes stored
//! payloads for listings. All state lives in the injected storage backend.

mod reconcile;

pub use reconcile::*;

use std::sync::Arc;

use serde_json::Value;

use crate::errors::AppError;
use crate::models::{AnyRecord, CollectionKind, Fields, RecordOptions};
use crate::storage::{PutOutcome, StorageBackend, StorageError, StoredItem, WriteOptions};

/// Largest accepted upload body, in bytes.
pub const MAX_ITEM_SIZE: usize = 8 * 1024;

const JSON_MEDIA_TYPE: &str = "application/json";

/// An upload addressed to one item.
#[derive(Debug, Clone, Copy)]
pub struct SetItemRequest<'a> {
    pub body: &'a [u8],
    /// Declared `Content-Type`, if any.
    pub content_type: Option<&'a str>,
    pub if_unmodified_since: Option<i64>,
}

/// A full stored item as returned to clients.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemView {
    pub data: Value,
    pub modified_at: i64,
}

/// Request orchestration for the apps and devices collections.
pub struct CollectionFacade {
    storage: Arc<dyn StorageBackend>,
    ignore_unknown_fields: bool,
    clock: fn() -> i64,
}

impl CollectionFacade {
    pub fn new(storage: Arc<dyn StorageBackend>, ignore_unknown_fields: bool) -> Self {
        Self {
            storage,
            ignore_unknown_fields,
            clock: now_ms,
        }
    }

    /// Replace the wall clock used to stamp writes.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// List a collection as `{collection: [items]}`, abbreviated unless `full`.
    pub async fn get_collection(
        &self,
        user_id: u64,
        collection: &str,
        after: Option<i64>,
        full: bool,
    ) -> Result<Value, AppError> {
        let kind: CollectionKind = collection.parse()?;

        let stored = match self.storage.list_items(user_id, kind.as_str(), after).await {
            Ok(items) => items,
            Err(StorageError::NotFound) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut items = Vec::with_capacity(stored.len());
        for item in &stored {
            let record = decode_record(kind, item)?;
            self.log_record_seen(user_id, kind, &item.id);
            let fields = if full {
                record.to_json()
            } else {
                record.abbreviate()
            };
            items.push(Value::Object(fields));
        }

        let mut listing = Fields::new();
        listing.insert(kind.as_str().to_string(), Value::Array(items));
        Ok(Value::Object(listing))
    }

    /// Latest write time in a collection, if it holds any items.
    pub async fn collection_timestamp(
        &self,
        user_id: u64,
        collection: &str,
    ) -> Result<Option<i64>, AppError> {
        let kind: CollectionKind = collection.parse()?;
        Ok(self
            .storage
            .collection_timestamp(user_id, kind.as_str())
            .await?)
    }

    /// Fetch one full item.
    pub async fn get_item(
        &self,
        user_id: u64,
        collection: &str,
        item_id: &str,
    ) -> Result<ItemView, AppError> {
        let kind: CollectionKind = collection.parse()?;
        let item = self
            .storage
            .get_item(user_id, kind.as_str(), item_id)
            .await
            .map_err(|e| item_error(e, kind, item_id))?;

        let data: Value = serde_json::from_str(&item.payload)
            .map_err(|e| corrupt_item(kind, &item.id, &e.to_string()))?;
        self.log_record_seen(user_id, kind, item_id);

        Ok(ItemView {
            data,
            modified_at: item.modified_at,
        })
    }

    /// Validate an upload and store it under `item_id`.
    pub async fn set_item(
        &self,
        user_id: u64,
        collection: &str,
        item_id: &str,
        request: SetItemRequest<'_>,
    ) -> Result<PutOutcome, AppError> {
        if let Some(content_type) = request.content_type {
            if !is_json_media_type(content_type) {
                return Err(AppError::UnsupportedMediaType(content_type.to_string()));
            }
        }
        if request.body.len() > MAX_ITEM_SIZE {
            return Err(AppError::PayloadTooLarge {
                size: request.body.len(),
                limit: MAX_ITEM_SIZE,
            });
        }
        let data: Value = serde_json::from_slice(request.body)
            .map_err(|e| AppError::MalformedJson(format!("Malformed JSON: {}", e)))?;

        let kind: CollectionKind = collection.parse()?;
        let options = RecordOptions {
            ignore_unknown_fields: self.ignore_unknown_fields,
        };
        let mut record = AnyRecord::from_json(kind, data, options)?;

        let previous = self.load_previous(user_id, kind, item_id).await?;
        let server_time = reconcile(&mut record, (self.clock)(), previous.as_ref());
        record.validate()?;

        let record_id = record.id()?;
        if record_id != item_id {
            return Err(AppError::IdentityMismatch {
                expected: record_id,
                actual: item_id.to_string(),
            });
        }
        self.log_record_seen(user_id, kind, item_id);

        let payload = serde_json::to_string(&record.to_json())
            .map_err(|e| AppError::Internal(format!("Failed to encode item: {}", e)))?;
        let outcome = self
            .storage
            .put_item(
                user_id,
                kind.as_str(),
                item_id,
                &payload,
                WriteOptions {
                    modified_at: server_time,
                    if_unmodified_since: request.if_unmodified_since,
                },
            )
            .await?;

        tracing::info!(
            user_id,
            collection = %kind,
            item_id,
            modified_at = outcome.modified_at,
            created = outcome.created,
            "Stored item"
        );
        Ok(outcome)
    }

    /// Delete one item.
    pub async fn delete_item(
        &self,
        user_id: u64,
        collection: &str,
        item_id: &str,
        if_unmodified_since: Option<i64>,
    ) -> Result<(), AppError> {
        let kind: CollectionKind = collection.parse()?;
        self.storage
            .delete_item(user_id, kind.as_str(), item_id, if_unmodified_since)
            .await
            .map_err(|e| item_error(e, kind, item_id))?;
        tracing::info!(user_id, collection = %kind, item_id, "Deleted item");
        Ok(())
    }

    /// The stored predecessor of an upload, if any item exists under the id.
    async fn load_previous(
        &self,
        user_id: u64,
        kind: CollectionKind,
        item_id: &str,
    ) -> Result<Option<StoredRecord>, AppError> {
        let item = match self.storage.get_item(user_id, kind.as_str(), item_id).await {
            Ok(item) => item,
            Err(StorageError::NotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record = match decode_record(kind, &item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Ignoring unreadable stored item {}/{}: {}", kind, item_id, e);
                None
            }
        };
        Ok(Some(StoredRecord {
            record,
            modified_at: item.modified_at,
        }))
    }

    /// Hook called whenever a record is sent to or received from a client.
    fn log_record_seen(&self, user_id: u64, kind: CollectionKind, item_id: &str) {
        tracing::debug!(user_id, collection = %kind, item_id, "record seen");
    }
}

/// Rebuild a stored payload as a record, tolerating legacy fields.
fn decode_record(kind: CollectionKind, item: &StoredItem) -> Result<AnyRecord, AppError> {
    let data: Value = serde_json::from_str(&item.payload)
        .map_err(|e| corrupt_item(kind, &item.id, &e.to_string()))?;
    AnyRecord::from_json(kind, data, RecordOptions::lenient())
        .map_err(|e| corrupt_item(kind, &item.id, &e.to_string()))
}

fn corrupt_item(kind: CollectionKind, item_id: &str, reason: &str) -> AppError {
    AppError::Internal(format!(
        "Stored item {}/{} is not a valid record: {}",
        kind, item_id, reason
    ))
}

fn item_error(err: StorageError, kind: CollectionKind, item_id: &str) -> AppError {
    match err {
        StorageError::NotFound => AppError::NotFound(format!("Item {}/{} not found", kind, item_id)),
        other => other.into(),
    }
}

/// Compare on the media type alone, ignoring parameters such as `charset`.
fn is_json_media_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|media| media.trim().eq_ignore_ascii_case(JSON_MEDIA_TYPE))
        .unwrap_or(false)
}
