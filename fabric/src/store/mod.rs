//! # Durable Key-Value Store
//!
//! String keys mapped to JSON values. The offline queue lives under
//! `offlineQueue`, the wallet session under `walletSession`.
//!
//! Backends:
//! - [`MemoryStore`]: process-local, used in tests and as a fallback
//! - [`FileStore`]: one JSON file per key, replaced atomically on write

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid stored value: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub trait Store: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    fn set(&self, key: &str, value: &Value) -> Result<(), StoreError>;

    /// Best-effort removal.
    fn remove(&self, key: &str);
}

/// Read and deserialize `key`.
pub fn load<T: DeserializeOwned>(store: &dyn Store, key: &str) -> Result<Option<T>, StoreError> {
    match store.get(key)? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serialize and write `value` under `key`.
pub fn save<T: Serialize>(store: &dyn Store, key: &str, value: &T) -> Result<(), StoreError> {
    let value = serde_json::to_value(value)?;
    store.set(key, &value)
}

/// File store under `FABRIC_STORE_DIR` (default `data/fabric`).
pub fn default_store() -> Arc<dyn Store> {
    let dir = std::env::var("FABRIC_STORE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/fabric"));
    Arc::new(FileStore::new(dir))
}
