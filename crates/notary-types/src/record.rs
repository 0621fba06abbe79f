use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::document::{DocumentId, Version};
use crate::hash::ContentHash;
use crate::location::StorageLocation;

/// Caller-supplied descriptive fields recorded with every version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    /// Issuing organisation, e.g. a university.
    pub issuer: String,
    /// Opaque to the registry; conventionally `YYYYMMDD`.
    pub date_issued: u64,
    /// Verifying organisation.
    pub verifier: String,
}

impl DocumentMetadata {
    pub fn new(issuer: impl Into<String>, date_issued: u64, verifier: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            date_issued,
            verifier: verifier.into(),
        }
    }
}

/// One confirmed version of a notarized document, as held by the ledger.
///
/// Records are created only by confirmed transactions and never change
/// afterwards. Field order matches the ledger's `getLatest` tuple.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: DocumentId,
    pub doc_hash: ContentHash,
    pub storage_location: StorageLocation,
    pub issuer: String,
    pub date_issued: u64,
    pub verifier: String,
    /// Signer of the transaction that created this version.
    pub owner: Address,
    pub version: Version,
    /// Ledger block time at confirmation, in unix seconds.
    pub created_at: u64,
}

impl Record {
    /// The metadata triple of this version.
    pub fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata {
            issuer: self.issuer.clone(),
            date_issued: self.date_issued,
            verifier: self.verifier.clone(),
        }
    }

    /// `true` for the all-zero tuple the ledger returns for unknown ids.
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
    }

    /// Block time as a UTC timestamp, if representable.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.created_at)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}
