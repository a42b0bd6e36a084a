//! Key-value store adapter
//!
//! Namespaced JSON get/set/remove/clear on top of a [`BlobStore`]. Nothing here
//! returns an error: failures are logged and read back as "absent" or `false`.

pub mod backend;

pub use backend::{BlobStore, FileBlobStore, MemoryBlobStore};

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

/// Prefix applied to every key we own
pub const KEY_PREFIX: &str = "@mymacro:";

/// Well-known storage keys (un-prefixed)
pub mod keys {
    pub const USER_STORE: &str = "user-store";
    pub const GROCERY_STORE: &str = "grocery-store";
    pub const CONVERSATION_PREFIX: &str = "conversation:";
    pub const SUMMARY_PREFIX: &str = "summary:";
    pub const PLANS: &str = "plans";
    pub const LAST_CLEANUP: &str = "last-cleanup";
}

#[derive(Clone)]
pub struct KvStore {
    backend: Arc<dyn BlobStore>,
    prefix: String,
}

impl KvStore {
    pub fn new(backend: Arc<dyn BlobStore>) -> Self {
        Self {
            backend,
            prefix: KEY_PREFIX.to_string(),
        }
    }

    /// Convenience constructor for an in-memory store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBlobStore::new()))
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.adapter().get_item(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Stored value failed to deserialize, treating as absent");
                None
            }
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(raw) => self.adapter().set_item(key, &raw).await,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize value");
                false
            }
        }
    }

    pub async fn remove(&self, key: &str) -> bool {
        self.adapter().remove_item(key).await
    }

    /// Remove every key inside our namespace; foreign keys are left alone
    pub async fn clear(&self) -> bool {
        let all = match self.backend.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to list keys for clear");
                return false;
            }
        };

        let mut ok = true;
        for key in all.iter().filter(|k| k.starts_with(&self.prefix)) {
            if let Err(e) = self.backend.remove(key).await {
                warn!(key = %key, error = %e, "Failed to remove key during clear");
                ok = false;
            }
        }
        ok
    }

    /// Un-prefixed keys currently stored in our namespace
    pub async fn keys(&self) -> Vec<String> {
        match self.backend.keys().await {
            Ok(keys) => keys
                .into_iter()
                .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
                .collect(),
            Err(e) => {
                warn!(error = %e, "Failed to list keys");
                Vec::new()
            }
        }
    }

    /// Raw-string adapter for the state persistence middleware
    pub fn adapter(&self) -> PersistAdapter {
        PersistAdapter {
            store: self.clone(),
        }
    }
}

/// `getItem` / `setItem` / `removeItem` over raw strings
#[derive(Clone)]
pub struct PersistAdapter {
    store: KvStore,
}

impl PersistAdapter {
    pub async fn get_item(&self, key: &str) -> Option<String> {
        let full = self.store.full_key(key);
        match self.store.backend.get(&full).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %full, error = %e, "Storage read failed");
                None
            }
        }
    }

    pub async fn set_item(&self, key: &str, value: &str) -> bool {
        let full = self.store.full_key(key);
        match self.store.backend.set(&full, value).await {
            Ok(()) => {
                debug!(key = %full, bytes = value.len(), "Stored item");
                true
            }
            Err(e) => {
                warn!(key = %full, error = %e, "Storage write failed");
                false
            }
        }
    }

    pub async fn remove_item(&self, key: &str) -> bool {
        let full = self.store.full_key(key);
        match self.store.backend.remove(&full).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %full, error = %e, "Storage remove failed");
                false
            }
        }
    }
}
