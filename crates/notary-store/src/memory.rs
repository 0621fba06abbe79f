use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use notary_crypto::ContentAddresser;
use notary_types::StorageLocation;

use crate::error::{StorageError, StoreResult};
use crate::traits::BlobStore;

const BACKEND: &str = "memory";

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. Locations are `mem-` followed by the
/// SHA-256 of the content, so identical uploads land at the same location.
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<StorageLocation, Bytes>>,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite the bytes behind an existing location.
    ///
    /// Only useful for simulating storage-side corruption in tests.
    pub fn tamper(&self, location: &StorageLocation, data: Bytes) -> StoreResult<()> {
        let mut map = self.blobs.write().map_err(|_| poisoned())?;
        match map.get_mut(location) {
            Some(slot) => {
                *slot = data;
                Ok(())
            }
            None => Err(StorageError::NotFound(location.clone())),
        }
    }

    fn location_for(data: &[u8]) -> StoreResult<StorageLocation> {
        let hash = ContentAddresser::new().hash_bytes(data);
        StorageLocation::new(format!("mem-{}", hash.to_hex()))
            .map_err(|e| StorageError::unavailable(BACKEND, e))
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn put(&self, data: Bytes, _filename_hint: Option<&str>) -> StoreResult<StorageLocation> {
        let location = Self::location_for(&data)?;
        let mut map = self.blobs.write().map_err(|_| poisoned())?;
        map.entry(location.clone()).or_insert(data);
        Ok(location)
    }

    async fn get(&self, location: &StorageLocation) -> StoreResult<Bytes> {
        let map = self.blobs.read().map_err(|_| poisoned())?;
        map.get(location)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(location.clone()))
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &self.len())
            .finish()
    }
}

fn poisoned() -> StorageError {
    StorageError::unavailable(BACKEND, "store lock poisoned")
}
