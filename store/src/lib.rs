//! Durable snapshot storage.
//!
//! Components own their state in memory and write a full JSON snapshot of it
//! under a fixed key after each successful mutation. Every backend (files on
//! disk, in-memory for testing) implements [`SnapshotStore`]; the rest of the
//! workspace depends only on the trait.

pub mod error;
pub mod file;

pub use error::StoreError;
pub use file::JsonFileStore;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Key/value storage of whole-component snapshots.
pub trait SnapshotStore: Send + Sync {
    /// Read the bytes saved under `key`, or `None` if nothing was saved yet.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace the bytes saved under `key`.
    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
}

/// Serialize `value` as pretty JSON and save it under `key`.
pub fn save_json<T: Serialize>(
    store: &dyn SnapshotStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let bytes =
        serde_json::to_vec_pretty(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    store.save(key, &bytes)
}

/// Load and deserialize the JSON snapshot under `key`.
pub fn load_json<T: DeserializeOwned>(
    store: &dyn SnapshotStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.load(key)? {
        None => Ok(None),
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Corruption(format!("{key}: {e}"))),
    }
}
