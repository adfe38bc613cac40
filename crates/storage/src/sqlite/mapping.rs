use chrono::{DateTime, Utc};
use progress_core::model::{Collection, ItemId, ItemType, UserId};
use sqlx::Row;

use crate::repository::{RemoteItem, RemoteItemRecord, StorageError};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn connection(e: sqlx::Error) -> StorageError {
    let unique = e
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if unique {
        StorageError::Conflict
    } else {
        StorageError::Connection(e.to_string())
    }
}

pub(crate) fn user_id_to_text(user_id: UserId) -> String {
    user_id.value().hyphenated().to_string()
}

pub(crate) fn parse_user_id(s: &str) -> Result<UserId, StorageError> {
    s.parse::<UserId>().map_err(ser)
}

pub(crate) fn parse_item_type(s: &str) -> Result<ItemType, StorageError> {
    s.parse::<ItemType>().map_err(ser)
}

pub(crate) fn map_item_id_row(row: &sqlx::sqlite::SqliteRow) -> Result<ItemId, StorageError> {
    let raw: i64 = row.try_get("item_id").map_err(ser)?;
    Ok(ItemId::new(raw))
}

pub(crate) fn map_remote_item_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<RemoteItem, StorageError> {
    let video_id: Option<i64> = row.try_get("video_id").map_err(ser)?;
    Ok(RemoteItem {
        item_id: map_item_id_row(row)?,
        video_id: video_id.map(ItemId::new),
    })
}

pub(crate) fn map_record_row(
    collection: Collection,
    row: &sqlx::sqlite::SqliteRow,
) -> Result<RemoteItemRecord, StorageError> {
    let user_id: String = row.try_get("user_id").map_err(ser)?;
    let item_type: String = row.try_get("item_type").map_err(ser)?;
    let video_id: Option<i64> = row.try_get("video_id").map_err(ser)?;
    let set_at: DateTime<Utc> = row
        .try_get(collection.timestamp_column())
        .map_err(ser)?;

    Ok(RemoteItemRecord {
        user_id: parse_user_id(&user_id)?,
        item_type: parse_item_type(&item_type)?,
        item_id: map_item_id_row(row)?,
        video_id: video_id.map(ItemId::new),
        set_at,
    })
}
