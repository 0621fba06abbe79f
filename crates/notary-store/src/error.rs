use notary_types::StorageLocation;

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backend could not be reached, or refused the request (auth,
    /// quota, non-success status).
    #[error("{backend} storage unavailable: {reason}")]
    Unavailable {
        backend: &'static str,
        reason: String,
    },

    /// The backend answered, but not in a shape we understand.
    #[error("{backend} returned an unexpected response: {reason}")]
    InvalidResponse {
        backend: &'static str,
        reason: String,
    },

    /// No content is stored at the location.
    #[error("no content stored at {0}")]
    NotFound(StorageLocation),

    /// The backend is misconfigured (missing credentials, bad URL).
    #[error("storage configuration error: {0}")]
    Config(String),
}

impl StorageError {
    pub(crate) fn unavailable(backend: &'static str, reason: impl ToString) -> Self {
        Self::Unavailable {
            backend,
            reason: reason.to_string(),
        }
    }

    /// Returns `true` when the backend was unreachable or refused the call.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StorageError>;
