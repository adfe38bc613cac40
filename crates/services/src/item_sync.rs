//! Local/remote synchronization of per-item flags.
//!
//! The local cache is the only state for anonymous callers. For a signed-in
//! user the remote table is authoritative on read, while writes land in the
//! local cache first and are forwarded to the remote table afterwards. No
//! public operation fails: remote and cache errors are logged and the caller
//! gets the best value available, tagged with where it came from.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use progress_core::Clock;
use progress_core::model::{Collection, ItemId, ItemType, LearnedItem, User};
use storage::repository::{KeyValueStore, RemoteItemRecord, RemoteItemStore};

use crate::error::LocalStoreError;
use crate::local_cache::{CacheEntry, decode_entries, migrate_legacy};

/// Where a returned value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncSource {
    /// Anonymous caller; only the local cache was consulted.
    Local,
    /// Read from the remote table; the local cache now mirrors it.
    Remote,
    /// The remote read failed and the local cache was used instead.
    LocalFallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Synced<T> {
    pub value: T,
    pub source: SyncSource,
}

impl<T> Synced<T> {
    #[must_use]
    pub fn new(value: T, source: SyncSource) -> Self {
        Self { value, source }
    }

    #[must_use]
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Outcome of forwarding a toggle to the remote table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteWrite {
    /// No user; nothing was sent.
    Skipped,
    Applied,
    /// The remote call failed. The local change stands.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToggleReport {
    /// Flag state after the toggle, as recorded locally.
    pub now_set: bool,
    pub remote: RemoteWrite,
}

/// Keeps one `Collection` of item flags in sync between the local cache and
/// the remote per-user table.
#[derive(Clone)]
pub struct ItemSyncService {
    collection: Collection,
    clock: Clock,
    local: Arc<dyn KeyValueStore>,
    remote: Arc<dyn RemoteItemStore>,
    local_guard: Arc<Mutex<()>>,
}

impl ItemSyncService {
    #[must_use]
    pub fn new(
        collection: Collection,
        clock: Clock,
        local: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteItemStore>,
    ) -> Self {
        Self {
            collection,
            clock,
            local,
            remote,
            local_guard: Arc::new(Mutex::new(())),
        }
    }

    #[must_use]
    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Item ids flagged for `item_type`.
    ///
    /// Anonymous callers get the local cache. Signed-in callers get the remote
    /// rows, and the cached entries of `item_type` are replaced by them; if the
    /// remote read fails the local cache is returned untouched.
    pub async fn load_items(&self, user: Option<&User>, item_type: ItemType) -> Synced<Vec<ItemId>> {
        self.load_scoped(user, item_type, None).await
    }

    /// Like `load_items`, restricted to the parts of one video. Only the cached
    /// entries of that video are replaced by the remote read. For
    /// `ItemType::Video` the video id is ignored.
    pub async fn load_items_in_video(
        &self,
        user: Option<&User>,
        item_type: ItemType,
        video_id: ItemId,
    ) -> Synced<Vec<ItemId>> {
        self.load_scoped(user, item_type, parent_video(item_type, Some(video_id)))
            .await
    }

    /// Flip the flag on `(item_type, item_id)`.
    ///
    /// `is_currently_set` is the state the caller last observed. The local
    /// cache is updated and persisted before the remote table is touched, and
    /// a remote failure does not undo it.
    pub async fn toggle_item(
        &self,
        user: Option<&User>,
        item_type: ItemType,
        item_id: ItemId,
        is_currently_set: bool,
    ) -> ToggleReport {
        self.toggle_scoped(user, item_type, item_id, None, is_currently_set)
            .await
    }

    /// Like `toggle_item`, recording the video the part belongs to. Turning the
    /// flag off only removes entries and rows of that video.
    pub async fn toggle_item_in_video(
        &self,
        user: Option<&User>,
        item_type: ItemType,
        item_id: ItemId,
        video_id: ItemId,
        is_currently_set: bool,
    ) -> ToggleReport {
        let parent = parent_video(item_type, Some(video_id));
        self.toggle_scoped(user, item_type, item_id, parent, is_currently_set)
            .await
    }

    /// Whether `(item_type, item_id)` is flagged, resolved through `load_items`.
    pub async fn is_item_set(&self, user: Option<&User>, item_type: ItemType, item_id: ItemId) -> bool {
        self.load_items(user, item_type).await.value.contains(&item_id)
    }

    async fn load_scoped(
        &self,
        user: Option<&User>,
        item_type: ItemType,
        video_id: Option<ItemId>,
    ) -> Synced<Vec<ItemId>> {
        let local_ids = {
            let _guard = self.lock_local();
            ids_in_scope(&self.load_local(), item_type, video_id)
        };

        let Some(user) = user else {
            return Synced::new(local_ids, SyncSource::Local);
        };

        let remote_items = match self
            .remote
            .select_items(self.collection, user.id(), item_type, video_id)
            .await
        {
            Ok(items) => items,
            Err(err) => {
                warn!(
                    collection = %self.collection,
                    item_type = %item_type,
                    video_id = ?video_id,
                    user_id = %user.id(),
                    error = %err,
                    "remote select failed; using local cache"
                );
                return Synced::new(local_ids, SyncSource::LocalFallback);
            }
        };
        debug!(
            collection = %self.collection,
            item_type = %item_type,
            video_id = ?video_id,
            count = remote_items.len(),
            "loaded remote items"
        );

        {
            let _guard = self.lock_local();
            let mut rebuilt: Vec<CacheEntry> = self
                .load_local()
                .into_iter()
                .filter(|entry| !entry.replaced_by(item_type, video_id))
                .collect();
            rebuilt.extend(remote_items.iter().map(|remote| {
                let item = LearnedItem::new(item_type, remote.item_id).in_video(remote.video_id);
                CacheEntry::from(item)
            }));
            self.save_local(&rebuilt);
        }

        Synced::new(
            remote_items.iter().map(|remote| remote.item_id).collect(),
            SyncSource::Remote,
        )
    }

    async fn toggle_scoped(
        &self,
        user: Option<&User>,
        item_type: ItemType,
        item_id: ItemId,
        video_id: Option<ItemId>,
        is_currently_set: bool,
    ) -> ToggleReport {
        let same = |entry: &CacheEntry| {
            entry.item().is_some_and(|item| {
                item.matches(item_type, item_id) && item.in_scope(item_type, video_id)
            })
        };
        {
            let _guard = self.lock_local();
            let mut entries = self.load_local();
            if is_currently_set {
                entries.retain(|entry| !same(entry));
            } else if !entries.iter().any(same) {
                entries.push(LearnedItem::new(item_type, item_id).in_video(video_id).into());
            }
            self.save_local(&entries);
        }

        let now_set = !is_currently_set;
        let Some(user) = user else {
            return ToggleReport {
                now_set,
                remote: RemoteWrite::Skipped,
            };
        };

        let remote = if is_currently_set {
            self.remote_delete(user, item_type, item_id, video_id).await
        } else {
            self.remote_insert(user, item_type, item_id, video_id).await
        };
        ToggleReport { now_set, remote }
    }

    async fn remote_delete(
        &self,
        user: &User,
        item_type: ItemType,
        item_id: ItemId,
        video_id: Option<ItemId>,
    ) -> RemoteWrite {
        match self
            .remote
            .delete_item(self.collection, user.id(), item_type, item_id, video_id)
            .await
        {
            Ok(()) => RemoteWrite::Applied,
            Err(err) => {
                warn!(
                    collection = %self.collection,
                    item_type = %item_type,
                    item_id = %item_id,
                    video_id = ?video_id,
                    user_id = %user.id(),
                    error = %err,
                    "remote delete failed"
                );
                RemoteWrite::Failed
            }
        }
    }

    async fn remote_insert(
        &self,
        user: &User,
        item_type: ItemType,
        item_id: ItemId,
        video_id: Option<ItemId>,
    ) -> RemoteWrite {
        let record = RemoteItemRecord::new(user.id(), item_type, item_id, self.clock.now())
            .with_parent_video(video_id);
        match self.remote.insert_item(self.collection, &record).await {
            Ok(()) => RemoteWrite::Applied,
            Err(err) => {
                warn!(
                    collection = %self.collection,
                    payload = ?record,
                    error = %err,
                    "remote insert failed"
                );
                RemoteWrite::Failed
            }
        }
    }

    fn lock_local(&self) -> MutexGuard<'_, ()> {
        self.local_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Current local cache; unreadable state counts as empty.
    fn load_local(&self) -> Vec<CacheEntry> {
        match self.read_local() {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    collection = %self.collection,
                    error = %err,
                    "local store unreadable; treating as empty"
                );
                Vec::new()
            }
        }
    }

    fn read_local(&self) -> Result<Vec<CacheEntry>, LocalStoreError> {
        if let Some(raw) = self
            .local
            .get_item(self.collection.local_key())
            .map_err(LocalStoreError::Read)?
        {
            let value: Value = serde_json::from_str(&raw).map_err(LocalStoreError::Parse)?;
            if let Value::Array(elements) = value {
                return Ok(decode_entries(elements));
            }
        }

        let Some(legacy_key) = self.collection.legacy_key() else {
            return Ok(Vec::new());
        };
        if let Some(raw) = self
            .local
            .get_item(legacy_key)
            .map_err(LocalStoreError::Read)?
        {
            let value: Value = serde_json::from_str(&raw).map_err(LocalStoreError::Parse)?;
            if let Value::Array(entries) = value {
                let migrated = migrate_legacy(&entries);
                info!(
                    collection = %self.collection,
                    count = migrated.len(),
                    "migrated legacy local store"
                );
                self.save_local(&migrated);
                return Ok(migrated);
            }
        }

        Ok(Vec::new())
    }

    fn save_local(&self, entries: &[CacheEntry]) {
        if let Err(err) = self.write_local(entries) {
            warn!(
                collection = %self.collection,
                error = %err,
                "failed to persist local store"
            );
        }
    }

    fn write_local(&self, entries: &[CacheEntry]) -> Result<(), LocalStoreError> {
        let raw = serde_json::to_string(entries).map_err(LocalStoreError::Encode)?;
        self.local
            .set_item(self.collection.local_key(), &raw)
            .map_err(LocalStoreError::Write)
    }
}

/// Videos are never scoped to a parent.
fn parent_video(item_type: ItemType, video_id: Option<ItemId>) -> Option<ItemId> {
    video_id.filter(|_| !item_type.mirrors_video_id())
}

fn ids_in_scope(
    entries: &[CacheEntry],
    item_type: ItemType,
    video_id: Option<ItemId>,
) -> Vec<ItemId> {
    entries
        .iter()
        .filter_map(CacheEntry::item)
        .filter(|item| item.in_scope(item_type, video_id))
        .map(|item| item.item_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use progress_core::model::UserId;
    use progress_core::time::fixed_clock;
    use serde_json::json;
    use storage::repository::{InMemoryKeyValueStore, InMemoryRemoteStore, RemoteCall};

    fn service(local: InMemoryKeyValueStore, remote: InMemoryRemoteStore) -> ItemSyncService {
        ItemSyncService::new(Collection::Learned, fixed_clock(), Arc::new(local), Arc::new(remote))
    }

    fn stored(local: &InMemoryKeyValueStore) -> Vec<LearnedItem> {
        let raw = local.get_item("learnedItems_v2").unwrap().unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    fn stored_raw(local: &InMemoryKeyValueStore) -> Value {
        let raw = local.get_item("learnedItems_v2").unwrap().unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[tokio::test]
    async fn corrupt_v2_is_treated_as_empty() {
        let local = InMemoryKeyValueStore::new()
            .with_item("learnedItems_v2", "{oops")
            .with_item("learnedVideoIds", "[1]");
        let svc = service(local, InMemoryRemoteStore::new());

        let loaded = svc.load_items(None, ItemType::Video).await;
        assert!(loaded.value.is_empty());
        assert_eq!(loaded.source, SyncSource::Local);
    }

    #[tokio::test]
    async fn non_array_v2_falls_back_to_legacy() {
        let local = InMemoryKeyValueStore::new()
            .with_item("learnedItems_v2", "null")
            .with_item("learnedVideoIds", "[4]");
        let svc = service(local.clone(), InMemoryRemoteStore::new());

        let loaded = svc.load_items(None, ItemType::Video).await;
        assert_eq!(loaded.value, vec![ItemId::new(4)]);
        assert_eq!(stored(&local), vec![LearnedItem::video(ItemId::new(4))]);
    }

    #[tokio::test]
    async fn v2_duplicates_are_tolerated_on_read() {
        let local = InMemoryKeyValueStore::new().with_item(
            "learnedItems_v2",
            r#"[{"itemType":"video","itemId":1},{"itemType":"video","itemId":1}]"#,
        );
        let svc = service(local, InMemoryRemoteStore::new());

        let loaded = svc.load_items(None, ItemType::Video).await;
        assert_eq!(loaded.value, vec![ItemId::new(1), ItemId::new(1)]);
    }

    #[tokio::test]
    async fn toggle_off_removes_every_duplicate() {
        let local = InMemoryKeyValueStore::new().with_item(
            "learnedItems_v2",
            r#"[{"itemType":"video","itemId":1},{"itemType":"vocab","itemId":1},{"itemType":"video","itemId":1}]"#,
        );
        let svc = service(local.clone(), InMemoryRemoteStore::new());

        let report = svc.toggle_item(None, ItemType::Video, ItemId::new(1), true).await;
        assert_eq!(
            report,
            ToggleReport {
                now_set: false,
                remote: RemoteWrite::Skipped
            }
        );
        assert_eq!(stored(&local), vec![LearnedItem::new(ItemType::Vocab, ItemId::new(1))]);
    }

    #[tokio::test]
    async fn insert_payload_is_stamped_by_clock() {
        let remote = InMemoryRemoteStore::new();
        let svc = service(InMemoryKeyValueStore::new(), remote.clone());
        let user = User::new(UserId::random());

        let report = svc
            .toggle_item(Some(&user), ItemType::Sentence, ItemId::new(12), false)
            .await;
        assert_eq!(report.remote, RemoteWrite::Applied);

        let calls = remote.calls();
        let [RemoteCall::Insert { collection, record }] = calls.as_slice() else {
            panic!("expected a single insert, got {calls:?}");
        };
        assert_eq!(*collection, Collection::Learned);
        assert_eq!(record.set_at, fixed_clock().now());
        assert_eq!(record.video_id, None);
    }

    #[tokio::test]
    async fn one_unknown_entry_does_not_empty_the_cache() {
        let local = InMemoryKeyValueStore::new().with_item(
            "learnedItems_v2",
            r#"[{"itemType":"video","itemId":1},{"itemType":"vocab","itemId":2},{"itemType":"podcast","itemId":9}]"#,
        );
        let svc = service(local.clone(), InMemoryRemoteStore::new());

        let loaded = svc.load_items(None, ItemType::Video).await;
        assert_eq!(loaded.value, vec![ItemId::new(1)]);

        svc.toggle_item(None, ItemType::Sentence, ItemId::new(5), false)
            .await;
        assert_eq!(
            stored_raw(&local),
            json!([
                {"itemType":"video","itemId":1},
                {"itemType":"vocab","itemId":2},
                {"itemType":"podcast","itemId":9},
                {"itemType":"sentence","itemId":5}
            ])
        );
    }

    #[tokio::test]
    async fn string_item_id_does_not_empty_the_cache() {
        let local = InMemoryKeyValueStore::new().with_item(
            "learnedItems_v2",
            r#"[{"itemType":"video","itemId":1},{"itemType":"video","itemId":"3"}]"#,
        );
        let svc = service(local, InMemoryRemoteStore::new());

        let loaded = svc.load_items(None, ItemType::Video).await;
        assert_eq!(loaded.value, vec![ItemId::new(1), ItemId::new(3)]);
    }

    #[tokio::test]
    async fn remote_rebuild_keeps_unknown_entries() {
        let local = InMemoryKeyValueStore::new().with_item(
            "learnedItems_v2",
            r#"[{"itemType":"video","itemId":"oops"},{"itemType":"podcast","itemId":9},{"itemType":"video","itemId":1}]"#,
        );
        let remote = InMemoryRemoteStore::new();
        let user = User::new(UserId::random());
        remote.seed(
            Collection::Learned,
            RemoteItemRecord::new(user.id(), ItemType::Video, ItemId::new(4), fixed_clock().now()),
        );
        let svc = service(local.clone(), remote);

        let loaded = svc.load_items(Some(&user), ItemType::Video).await;
        assert_eq!(loaded.value, vec![ItemId::new(4)]);
        assert_eq!(
            stored_raw(&local),
            json!([{"itemType":"podcast","itemId":9},{"itemType":"video","itemId":4}])
        );
    }

    #[tokio::test]
    async fn scoped_toggle_and_load_stay_within_their_video() {
        let local = InMemoryKeyValueStore::new();
        let remote = InMemoryRemoteStore::new();
        let svc = service(local.clone(), remote.clone());
        let user = User::new(UserId::random());
        let (one, two) = (ItemId::new(1), ItemId::new(2));

        svc.toggle_item_in_video(Some(&user), ItemType::Sentence, ItemId::new(5), one, false)
            .await;
        svc.toggle_item_in_video(Some(&user), ItemType::Sentence, ItemId::new(5), two, false)
            .await;
        svc.toggle_item_in_video(Some(&user), ItemType::Sentence, ItemId::new(6), two, false)
            .await;

        let in_two = svc.load_items_in_video(None, ItemType::Sentence, two).await;
        assert_eq!(in_two.value, vec![ItemId::new(5), ItemId::new(6)]);

        svc.toggle_item_in_video(Some(&user), ItemType::Sentence, ItemId::new(5), two, true)
            .await;
        let in_one = svc.load_items_in_video(Some(&user), ItemType::Sentence, one).await;
        assert_eq!(in_one.value, vec![ItemId::new(5)]);
        assert_eq!(in_one.source, SyncSource::Remote);
        let in_two = svc.load_items_in_video(Some(&user), ItemType::Sentence, two).await;
        assert_eq!(in_two.value, vec![ItemId::new(6)]);

        assert_eq!(
            stored(&local),
            vec![
                LearnedItem::new(ItemType::Sentence, ItemId::new(5)).in_video(Some(one)),
                LearnedItem::new(ItemType::Sentence, ItemId::new(6)).in_video(Some(two)),
            ]
        );
        assert!(
            remote
                .rows(Collection::Learned)
                .iter()
                .all(|row| row.video_id.is_some())
        );
    }

    #[tokio::test]
    async fn video_toggles_ignore_a_parent_video() {
        let remote = InMemoryRemoteStore::new();
        let local = InMemoryKeyValueStore::new();
        let svc = service(local.clone(), remote.clone());
        let user = User::new(UserId::random());

        let (video, parent) = (ItemId::new(3), ItemId::new(8));
        svc.toggle_item_in_video(Some(&user), ItemType::Video, video, parent, false)
            .await;
        assert_eq!(stored(&local), vec![LearnedItem::video(ItemId::new(3))]);
        assert_eq!(remote.rows(Collection::Learned)[0].video_id, Some(ItemId::new(3)));
    }
}
