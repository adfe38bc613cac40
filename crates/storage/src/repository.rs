use async_trait::async_trait;
use chrono::{DateTime, Utc};
use progress_core::model::{Collection, ItemId, ItemType, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Synchronous string key-value persistence, the shape of browser local
/// storage.
///
/// Implementations must be cheap enough to call on every read; the
/// synchronizer does not cache values between calls.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing medium cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be persisted.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Row inserted into a remote per-user table when an item is flagged.
///
/// `video_id` mirrors `item_id` for video rows; older consumers of the remote
/// schema still read that column and it is constrained there. Sentence and
/// vocabulary rows may carry the video they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteItemRecord {
    pub user_id: UserId,
    pub item_type: ItemType,
    pub item_id: ItemId,
    pub video_id: Option<ItemId>,
    pub set_at: DateTime<Utc>,
}

impl RemoteItemRecord {
    #[must_use]
    pub fn new(user_id: UserId, item_type: ItemType, item_id: ItemId, set_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            item_type,
            item_id,
            video_id: item_type.mirrors_video_id().then_some(item_id),
            set_at,
        }
    }

    /// Record the parent video of a sentence or vocabulary row. Video rows
    /// keep mirroring their own id.
    #[must_use]
    pub fn with_parent_video(mut self, video_id: Option<ItemId>) -> Self {
        if !self.item_type.mirrors_video_id() {
            self.video_id = video_id;
        }
        self
    }

    #[must_use]
    pub fn matches(&self, user_id: UserId, item_type: ItemType, item_id: ItemId) -> bool {
        self.user_id == user_id && self.item_type == item_type && self.item_id == item_id
    }

    /// `true` when no parent filter is given or the row's `video_id` equals it.
    #[must_use]
    pub fn in_video(&self, video_id: Option<ItemId>) -> bool {
        video_id.is_none_or(|v| self.video_id == Some(v))
    }
}

/// A flagged item as read back from a remote table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteItem {
    pub item_id: ItemId,
    pub video_id: Option<ItemId>,
}

/// Remote per-user store, one table per `Collection`.
#[async_trait]
pub trait RemoteItemStore: Send + Sync {
    /// Items flagged by `user_id` for `item_type`, oldest first. When
    /// `video_id` is given only rows of that video are returned.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query cannot be completed.
    async fn select_items(
        &self,
        collection: Collection,
        user_id: UserId,
        item_type: ItemType,
        video_id: Option<ItemId>,
    ) -> Result<Vec<RemoteItem>, StorageError>;

    /// Remove every row matching `(user_id, item_type, item_id)`, restricted
    /// to `video_id` when given. Deleting a missing row is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete cannot be completed.
    async fn delete_item(
        &self,
        collection: Collection,
        user_id: UserId,
        item_type: ItemType,
        item_id: ItemId,
        video_id: Option<ItemId>,
    ) -> Result<(), StorageError>;

    /// Insert a new row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the same item is already flagged
    /// under the same parent video, or other storage errors.
    async fn insert_item(
        &self,
        collection: Collection,
        record: &RemoteItemRecord,
    ) -> Result<(), StorageError>;
}

/// In-memory key-value store for tests and anonymous sessions.
#[derive(Clone, Default)]
pub struct InMemoryKeyValueStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a key, returning the store for chaining in tests.
    #[must_use]
    pub fn with_item(self, key: &str, value: &str) -> Self {
        if let Ok(mut guard) = self.values.lock() {
            guard.insert(key.to_owned(), value.to_owned());
        }
        self
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// A call observed by `InMemoryRemoteStore`, failed or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Select {
        collection: Collection,
        user_id: UserId,
        item_type: ItemType,
        video_id: Option<ItemId>,
    },
    Delete {
        collection: Collection,
        user_id: UserId,
        item_type: ItemType,
        item_id: ItemId,
        video_id: Option<ItemId>,
    },
    Insert {
        collection: Collection,
        record: RemoteItemRecord,
    },
}

#[derive(Default)]
struct FailurePlan {
    select: AtomicBool,
    delete: AtomicBool,
    insert: AtomicBool,
}

/// In-memory remote store with failure injection and a call journal.
#[derive(Clone, Default)]
pub struct InMemoryRemoteStore {
    rows: Arc<Mutex<Vec<(Collection, RemoteItemRecord)>>>,
    calls: Arc<Mutex<Vec<RemoteCall>>>,
    failures: Arc<FailurePlan>,
}

impl InMemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row directly, bypassing the journal.
    pub fn seed(&self, collection: Collection, record: RemoteItemRecord) {
        if let Ok(mut guard) = self.rows.lock() {
            guard.push((collection, record));
        }
    }

    pub fn fail_selects(&self, fail: bool) {
        self.failures.select.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.failures.delete.store(fail, Ordering::SeqCst);
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.failures.insert.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn rows(&self, collection: Collection) -> Vec<RemoteItemRecord> {
        self.rows
            .lock()
            .map(|guard| {
                guard
                    .iter()
                    .filter(|(c, _)| *c == collection)
                    .map(|(_, r)| r.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn record_call(&self, call: RemoteCall) -> Result<(), StorageError> {
        let mut guard = self
            .calls
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.push(call);
        Ok(())
    }
}

fn injected(flag: &AtomicBool, op: &str) -> Result<(), StorageError> {
    if flag.load(Ordering::SeqCst) {
        return Err(StorageError::Connection(format!("injected {op} failure")));
    }
    Ok(())
}

#[async_trait]
impl RemoteItemStore for InMemoryRemoteStore {
    async fn select_items(
        &self,
        collection: Collection,
        user_id: UserId,
        item_type: ItemType,
        video_id: Option<ItemId>,
    ) -> Result<Vec<RemoteItem>, StorageError> {
        self.record_call(RemoteCall::Select {
            collection,
            user_id,
            item_type,
            video_id,
        })?;
        injected(&self.failures.select, "select")?;

        let guard = self
            .rows
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .iter()
            .filter(|(c, r)| {
                *c == collection
                    && r.user_id == user_id
                    && r.item_type == item_type
                    && r.in_video(video_id)
            })
            .map(|(_, r)| RemoteItem {
                item_id: r.item_id,
                video_id: r.video_id,
            })
            .collect())
    }

    async fn delete_item(
        &self,
        collection: Collection,
        user_id: UserId,
        item_type: ItemType,
        item_id: ItemId,
        video_id: Option<ItemId>,
    ) -> Result<(), StorageError> {
        self.record_call(RemoteCall::Delete {
            collection,
            user_id,
            item_type,
            item_id,
            video_id,
        })?;
        injected(&self.failures.delete, "delete")?;

        let mut guard = self
            .rows
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.retain(|(c, r)| {
            !(*c == collection && r.matches(user_id, item_type, item_id) && r.in_video(video_id))
        });
        Ok(())
    }

    async fn insert_item(
        &self,
        collection: Collection,
        record: &RemoteItemRecord,
    ) -> Result<(), StorageError> {
        self.record_call(RemoteCall::Insert {
            collection,
            record: record.clone(),
        })?;
        injected(&self.failures.insert, "insert")?;

        let mut guard = self
            .rows
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let exists = guard.iter().any(|(c, r)| {
            *c == collection
                && r.matches(record.user_id, record.item_type, record.item_id)
                && r.video_id == record.video_id
        });
        if exists {
            return Err(StorageError::Conflict);
        }
        guard.push((collection, record.clone()));
        Ok(())
    }
}

/// Local and remote ports behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub local: Arc<dyn KeyValueStore>,
    pub remote: Arc<dyn RemoteItemStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let local: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());
        let remote: Arc<dyn RemoteItemStore> = Arc::new(InMemoryRemoteStore::new());
        Self { local, remote }
    }
}
