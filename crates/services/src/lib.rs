#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod favorites_service;
pub mod item_sync;
mod local_cache;
pub mod progress_service;

pub use progress_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, LocalStoreError};
pub use favorites_service::FavoritesService;
pub use item_sync::{ItemSyncService, RemoteWrite, SyncSource, Synced, ToggleReport};
pub use progress_service::ProgressService;
