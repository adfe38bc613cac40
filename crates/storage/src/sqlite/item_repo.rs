use async_trait::async_trait;
use progress_core::model::{Collection, ItemId, ItemType, UserId};

use super::SqliteRepository;
use super::mapping::{connection, map_record_row, map_remote_item_row, user_id_to_text};
use crate::repository::{RemoteItem, RemoteItemRecord, RemoteItemStore, StorageError};

impl SqliteRepository {
    /// Full rows of `collection` for `user_id`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails or a row cannot be decoded.
    pub async fn list_records(
        &self,
        collection: Collection,
        user_id: UserId,
    ) -> Result<Vec<RemoteItemRecord>, StorageError> {
        let table = collection.remote_table();
        let stamp = collection.timestamp_column();
        let rows = sqlx::query(&format!(
            r"
            SELECT user_id, item_type, item_id, video_id, {stamp}
            FROM {table}
            WHERE user_id = ?1
            ORDER BY id ASC
            "
        ))
        .bind(user_id_to_text(user_id))
        .fetch_all(&self.pool)
        .await
        .map_err(connection)?;

        rows.iter()
            .map(|row| map_record_row(collection, row))
            .collect()
    }
}

#[async_trait]
impl RemoteItemStore for SqliteRepository {
    async fn select_items(
        &self,
        collection: Collection,
        user_id: UserId,
        item_type: ItemType,
        video_id: Option<ItemId>,
    ) -> Result<Vec<RemoteItem>, StorageError> {
        let table = collection.remote_table();
        let rows = sqlx::query(&format!(
            r"
            SELECT item_id, video_id
            FROM {table}
            WHERE user_id = ?1 AND item_type = ?2 AND (?3 IS NULL OR video_id = ?3)
            ORDER BY id ASC
            "
        ))
        .bind(user_id_to_text(user_id))
        .bind(item_type.as_str())
        .bind(video_id.map(|id| id.value()))
        .fetch_all(&self.pool)
        .await
        .map_err(connection)?;

        rows.iter().map(map_remote_item_row).collect()
    }

    async fn delete_item(
        &self,
        collection: Collection,
        user_id: UserId,
        item_type: ItemType,
        item_id: ItemId,
        video_id: Option<ItemId>,
    ) -> Result<(), StorageError> {
        let table = collection.remote_table();
        sqlx::query(&format!(
            r"
            DELETE FROM {table}
            WHERE user_id = ?1 AND item_type = ?2 AND item_id = ?3
                AND (?4 IS NULL OR video_id = ?4)
            "
        ))
        .bind(user_id_to_text(user_id))
        .bind(item_type.as_str())
        .bind(item_id.value())
        .bind(video_id.map(|id| id.value()))
        .execute(&self.pool)
        .await
        .map_err(connection)?;

        Ok(())
    }

    async fn insert_item(
        &self,
        collection: Collection,
        record: &RemoteItemRecord,
    ) -> Result<(), StorageError> {
        let table = collection.remote_table();
        let stamp = collection.timestamp_column();
        sqlx::query(&format!(
            r"
            INSERT INTO {table} (user_id, item_type, item_id, video_id, {stamp})
            VALUES (?1, ?2, ?3, ?4, ?5)
            "
        ))
        .bind(user_id_to_text(record.user_id))
        .bind(record.item_type.as_str())
        .bind(record.item_id.value())
        .bind(record.video_id.map(|id| id.value()))
        .bind(record.set_at)
        .execute(&self.pool)
        .await
        .map_err(connection)?;

        Ok(())
    }
}
