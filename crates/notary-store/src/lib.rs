//! Content-addressed blob storage for the document notary.
//!
//! The registry stores every document's bytes before it records anything on
//! the ledger, so a record always points at retrievable content. Storage is
//! reached through the [`BlobStore`] trait; the backend is picked once, at
//! configuration time.
//!
//! # Storage Backends
//!
//! - [`PinningServiceStore`] -- Pinata-compatible HTTP pinning service
//! - [`LocalDaemonStore`] -- IPFS daemon HTTP API (`/api/v0/add`)
//! - [`InMemoryBlobStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. `put` either returns a location the backend accepted or fails; there
//!    is no implicit retry.
//! 2. A backend that cannot be reached or refuses the upload reports
//!    [`StorageError::Unavailable`].
//! 3. The store never interprets document contents.

pub mod config;
pub mod daemon;
pub mod error;
pub mod memory;
pub mod pinning;
pub mod traits;

pub use config::{PinningCredentials, StoreConfig};
pub use daemon::LocalDaemonStore;
pub use error::{StorageError, StoreResult};
pub use memory::InMemoryBlobStore;
pub use pinning::PinningServiceStore;
pub use traits::BlobStore;
