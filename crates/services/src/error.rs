//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Failures reading or writing the local cache.
///
/// Never returned from the synchronizer's public operations: they are logged
/// and the cache is treated as empty or left unpersisted.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LocalStoreError {
    #[error("failed to read local store: {0}")]
    Read(#[source] StorageError),
    #[error("failed to parse local store: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("failed to encode local store: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write local store: {0}")]
    Write(#[source] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
