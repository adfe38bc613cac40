#![forbid(unsafe_code)]

pub mod file;
pub mod repository;
pub mod sqlite;

pub use file::FileKeyValueStore;
pub use repository::{
    InMemoryKeyValueStore, InMemoryRemoteStore, KeyValueStore, RemoteItem, RemoteItemRecord,
    RemoteItemStore, Storage, StorageError,
};
