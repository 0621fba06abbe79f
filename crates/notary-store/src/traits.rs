use async_trait::async_trait;
use bytes::Bytes;
use notary_types::StorageLocation;

use crate::error::StoreResult;

/// Content-addressable blob store.
///
/// All implementations must satisfy these invariants:
/// - `put` returns only after the backend has accepted the bytes; the
///   returned location is the backend's content identifier.
/// - An unreachable or refusing backend yields
///   [`StorageError::Unavailable`](crate::StorageError::Unavailable), never a
///   location.
/// - No implicit retries. The caller decides.
/// - Once bytes start streaming to a remote backend the upload cannot be
///   cancelled; dropping the future is best effort only.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short backend name for logs and error messages.
    fn backend_name(&self) -> &'static str;

    /// Store `data` and return its location.
    ///
    /// `filename_hint` is passed to backends that keep a display name.
    async fn put(&self, data: Bytes, filename_hint: Option<&str>) -> StoreResult<StorageLocation>;

    /// Fetch the bytes stored at `location`.
    async fn get(&self, location: &StorageLocation) -> StoreResult<Bytes>;
}
