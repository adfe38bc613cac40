use std::path::Path;
use std::sync::Arc;

use progress_core::model::Collection;
use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::favorites_service::FavoritesService;
use crate::item_sync::ItemSyncService;
use crate::progress_service::ProgressService;

/// Assembles app-facing services over one `Storage`.
#[derive(Clone)]
pub struct AppServices {
    progress: Arc<ProgressService>,
    favorites: Arc<FavoritesService>,
}

impl AppServices {
    /// Build services over a JSON-file local store and a `SQLite` remote store.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        local_path: impl AsRef<Path>,
        db_url: &str,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(local_path, db_url).await?;
        Ok(Self::from_storage(&storage, clock))
    }

    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), clock)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock) -> Self {
        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&storage.local),
            Arc::clone(&storage.remote),
        ));
        let favorites = Arc::new(FavoritesService::new(
            clock,
            Arc::clone(&storage.local),
            Arc::clone(&storage.remote),
        ));
        Self {
            progress,
            favorites,
        }
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn favorites(&self) -> Arc<FavoritesService> {
        Arc::clone(&self.favorites)
    }

    /// The synchronizer behind `collection`.
    #[must_use]
    pub fn items(&self, collection: Collection) -> &ItemSyncService {
        match collection {
            Collection::Learned => self.progress.items(),
            Collection::Favorites => self.favorites.items(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use progress_core::model::{ItemId, ItemType};
    use progress_core::time::fixed_clock;

    #[test]
    fn items_are_routed_by_collection() {
        let services = AppServices::in_memory(fixed_clock());
        assert_eq!(services.items(Collection::Learned).collection(), Collection::Learned);
        assert_eq!(services.items(Collection::Favorites).collection(), Collection::Favorites);
    }

    #[tokio::test]
    async fn sqlite_services_share_the_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let local_path = dir.path().join("local-storage.json");
        let services = AppServices::new_sqlite(
            &local_path,
            "sqlite:file:memdb_app_services?mode=memory&cache=shared",
            fixed_clock(),
        )
        .await
        .unwrap();

        services
            .progress()
            .toggle_learned_item(None, ItemType::Vocab, ItemId::new(2), false)
            .await;

        let reopened = AppServices::new_sqlite(
            &local_path,
            "sqlite:file:memdb_app_services?mode=memory&cache=shared",
            fixed_clock(),
        )
        .await
        .unwrap();
        assert!(
            reopened
                .progress()
                .is_learned(None, ItemType::Vocab, ItemId::new(2))
                .await
        );
    }
}
