use chrono::Utc;
use progress_core::model::Collection;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use super::SqliteInitError;

/// Runs the versioned schema migrations.
///
/// Version 1 creates one table per collection. Video rows must carry
/// `video_id`; older readers of the remote schema join on it. Version 2 lets
/// the same sentence or vocabulary item be flagged under several videos.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for collection in [Collection::Learned, Collection::Favorites] {
            let table = collection.remote_table();
            let stamp = collection.timestamp_column();

            sqlx::query(&format!(
                r"
                CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    item_type TEXT NOT NULL CHECK (item_type IN ('video', 'sentence', 'vocab')),
                    item_id INTEGER NOT NULL,
                    video_id INTEGER,
                    {stamp} TEXT NOT NULL,
                    CHECK (item_type <> 'video' OR video_id IS NOT NULL)
                );
                "
            ))
            .execute(&mut *tx)
            .await?;

            sqlx::query(&format!(
                r"
                CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_user_item
                    ON {table} (user_id, item_type, item_id);
                "
            ))
            .execute(&mut *tx)
            .await?;
        }

        record_version(&mut tx, 1).await?;
        tx.commit().await?;
        info!(version = 1, "applied remote schema migration");
    }

    if !is_applied(pool, 2).await? {
        let mut tx = pool.begin().await?;

        for collection in [Collection::Learned, Collection::Favorites] {
            let table = collection.remote_table();

            sqlx::query(&format!("DROP INDEX IF EXISTS idx_{table}_user_item;"))
                .execute(&mut *tx)
                .await?;

            sqlx::query(&format!(
                r"
                CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_user_item_video
                    ON {table} (user_id, item_type, item_id, IFNULL(video_id, -1));
                "
            ))
            .execute(&mut *tx)
            .await?;
        }

        record_version(&mut tx, 2).await?;
        tx.commit().await?;
        info!(version = 2, "applied remote schema migration");
    }

    Ok(())
}

async fn record_version(
    tx: &mut Transaction<'_, Sqlite>,
    version: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
            INSERT INTO schema_migrations (version, applied_at)
            VALUES (?1, ?2)
            ON CONFLICT(version) DO NOTHING
        ",
    )
    .bind(version)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;
    Ok(())
}
