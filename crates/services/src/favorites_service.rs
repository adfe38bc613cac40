use std::sync::Arc;

use progress_core::Clock;
use progress_core::model::{Collection, ItemId, ItemType, User};
use storage::repository::{KeyValueStore, RemoteItemStore};

use crate::item_sync::{ItemSyncService, Synced, ToggleReport};

/// Favorite videos, sentences and vocabulary entries.
///
/// Shares the synchronization rules of `ProgressService` but keeps its own
/// local keys and remote table.
#[derive(Clone)]
pub struct FavoritesService {
    items: ItemSyncService,
}

impl FavoritesService {
    #[must_use]
    pub fn new(
        clock: Clock,
        local: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteItemStore>,
    ) -> Self {
        Self {
            items: ItemSyncService::new(Collection::Favorites, clock, local, remote),
        }
    }

    #[must_use]
    pub fn items(&self) -> &ItemSyncService {
        &self.items
    }

    pub async fn load_favorite_items(
        &self,
        user: Option<&User>,
        item_type: ItemType,
    ) -> Synced<Vec<ItemId>> {
        self.items.load_items(user, item_type).await
    }

    pub async fn toggle_favorite_item(
        &self,
        user: Option<&User>,
        item_type: ItemType,
        item_id: ItemId,
        is_currently_favorite: bool,
    ) -> ToggleReport {
        self.items
            .toggle_item(user, item_type, item_id, is_currently_favorite)
            .await
    }

    pub async fn is_favorite(&self, user: Option<&User>, item_type: ItemType, item_id: ItemId) -> bool {
        self.items.is_item_set(user, item_type, item_id).await
    }

    pub async fn load_favorite_video_ids(&self, user: Option<&User>) -> Synced<Vec<ItemId>> {
        self.load_favorite_items(user, ItemType::Video).await
    }

    /// Favorite sentence ids within one video.
    pub async fn load_favorite_sentence_ids(
        &self,
        user: Option<&User>,
        video_id: ItemId,
    ) -> Synced<Vec<ItemId>> {
        self.items
            .load_items_in_video(user, ItemType::Sentence, video_id)
            .await
    }

    /// Favorite vocabulary ids within one video.
    pub async fn load_favorite_vocab_ids(
        &self,
        user: Option<&User>,
        video_id: ItemId,
    ) -> Synced<Vec<ItemId>> {
        self.items
            .load_items_in_video(user, ItemType::Vocab, video_id)
            .await
    }

    pub async fn toggle_favorite_sentence(
        &self,
        user: Option<&User>,
        sentence_id: ItemId,
        is_currently_favorite: bool,
        video_id: ItemId,
    ) -> ToggleReport {
        self.items
            .toggle_item_in_video(
                user,
                ItemType::Sentence,
                sentence_id,
                video_id,
                is_currently_favorite,
            )
            .await
    }

    pub async fn toggle_favorite_vocab(
        &self,
        user: Option<&User>,
        vocab_id: ItemId,
        is_currently_favorite: bool,
        video_id: ItemId,
    ) -> ToggleReport {
        self.items
            .toggle_item_in_video(
                user,
                ItemType::Vocab,
                vocab_id,
                video_id,
                is_currently_favorite,
            )
            .await
    }

    /// Same contract as `ProgressService::toggle_learned_video`: the result
    /// is the local cache only.
    pub async fn toggle_favorite_video(
        &self,
        user: Option<&User>,
        video_id: ItemId,
        is_currently_favorite: bool,
    ) -> Vec<ItemId> {
        self.toggle_favorite_item(user, ItemType::Video, video_id, is_currently_favorite)
            .await;
        self.load_favorite_video_ids(None).await.into_value()
    }
}
