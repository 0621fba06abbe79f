//! Foundation types for the document notary.
//!
//! Every other notary crate depends on `notary-types`. The types here model
//! the on-ledger registry: a logical document is a lineage of versions keyed
//! by a ledger-assigned [`DocumentId`], each version pinned to the SHA-256
//! [`ContentHash`] of its bytes and a [`StorageLocation`] in
//! content-addressed storage.
//!
//! # Key Types
//!
//! - [`DocumentId`] -- ledger-assigned lineage identifier (`0` = not found)
//! - [`Version`] -- 1-based, gapless version counter within a lineage
//! - [`ContentHash`] -- 32-byte SHA-256 digest, the lookup key
//! - [`Address`] -- 20-byte account identity of a transaction signer
//! - [`StorageLocation`] -- opaque pointer into blob storage (e.g. a CID)
//! - [`Record`] -- one confirmed version of a document

pub mod address;
pub mod document;
pub mod error;
pub mod hash;
pub mod location;
pub mod record;

pub use address::Address;
pub use document::{DocumentId, Version};
pub use error::TypeError;
pub use hash::{ContentHash, DigestAlgorithm, DIGEST_ALGORITHM};
pub use location::StorageLocation;
pub use record::{DocumentMetadata, Record};
