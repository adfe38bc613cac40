use std::sync::Arc;

use progress_core::Clock;
use progress_core::model::{Collection, ItemId, ItemType, User};
use storage::repository::{KeyValueStore, RemoteItemStore};

use crate::item_sync::{ItemSyncService, Synced, ToggleReport};

/// Learned/unlearned state of videos and their parts.
#[derive(Clone)]
pub struct ProgressService {
    items: ItemSyncService,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        local: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteItemStore>,
    ) -> Self {
        Self {
            items: ItemSyncService::new(Collection::Learned, clock, local, remote),
        }
    }

    #[must_use]
    pub fn items(&self) -> &ItemSyncService {
        &self.items
    }

    pub async fn load_learned_items(
        &self,
        user: Option<&User>,
        item_type: ItemType,
    ) -> Synced<Vec<ItemId>> {
        self.items.load_items(user, item_type).await
    }

    pub async fn toggle_learned_item(
        &self,
        user: Option<&User>,
        item_type: ItemType,
        item_id: ItemId,
        is_currently_learned: bool,
    ) -> ToggleReport {
        self.items
            .toggle_item(user, item_type, item_id, is_currently_learned)
            .await
    }

    pub async fn is_learned(&self, user: Option<&User>, item_type: ItemType, item_id: ItemId) -> bool {
        self.items.is_item_set(user, item_type, item_id).await
    }

    pub async fn load_learned_video_ids(&self, user: Option<&User>) -> Synced<Vec<ItemId>> {
        self.load_learned_items(user, ItemType::Video).await
    }

    /// Toggle a video, then return the learned video ids from the local cache
    /// only. The remote table is not re-read even when `user` is signed in.
    pub async fn toggle_learned_video(
        &self,
        user: Option<&User>,
        video_id: ItemId,
        is_currently_learned: bool,
    ) -> Vec<ItemId> {
        self.toggle_learned_item(user, ItemType::Video, video_id, is_currently_learned)
            .await;
        self.load_learned_video_ids(None).await.into_value()
    }
}
