//! Document version registry.
//!
//! Notarizes documents against an append-only ledger. Each document is
//! hashed with SHA-256, its bytes are pinned in content-addressed storage,
//! and a record binding the hash to the storage location is written to the
//! registry contract. A logical document is a lineage of versions under one
//! ledger-assigned id; only the owner of the latest version may add the next.
//!
//! # Registration Pipeline
//!
//! | Stage | Work | Failure |
//! |-------|------|---------|
//! | hashing | stream the source through the addresser | `InvalidInput`, `ReadError` |
//! | storing | `BlobStore::put` | `StorageFailed` |
//! | submitting | optional duplicate pre-check, then `addDocument`/`addVersion` | `DuplicateHash`, `SubmitFailed` |
//! | confirming | wait for the receipt | `ChainRejected`, or the `ChainPending` outcome |
//! | resolving | `lookupByHash` + `getLatest`/`getVersion` | `MalformedRecord`, `Ledger` |
//!
//! Nothing reaches the ledger unless the bytes were stored. Rejected and
//! pending registrations are never retried implicitly; pending ones are
//! reconciled by content hash.

pub mod config;
pub mod error;
pub mod outcome;
pub mod request;
pub mod service;

pub use config::{ConfigError, RegistryConfig};
pub use error::{PipelineStage, RegistryError, RegistryResult};
pub use outcome::{PendingRegistration, Registration, RegistrationOutcome, Verification};
pub use request::{DocumentSource, RegistrationRequest, RegistrationTarget};
pub use service::{RegistryOptions, RegistryService, DEFAULT_CONFIRM_TIMEOUT};
