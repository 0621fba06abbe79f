use chrono::{DateTime, Utc};
use notary_ledger::{Receipt, TxHash};
use notary_types::{ContentHash, Record, StorageLocation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::request::RegistrationTarget;

/// Result of a registration that did not fail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RegistrationOutcome {
    /// Mined, and the resulting record was read back.
    Confirmed(Registration),
    /// Broadcast but not confirmed before the deadline, or broadcast without
    /// a usable answer from the node. The transaction may still land;
    /// reconcile by hash instead of resubmitting.
    ChainPending(PendingRegistration),
}

impl RegistrationOutcome {
    pub fn record(&self) -> Option<&Record> {
        match self {
            Self::Confirmed(reg) => Some(&reg.record),
            Self::ChainPending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::ChainPending(_))
    }

    pub fn request_id(&self) -> Uuid {
        match self {
            Self::Confirmed(reg) => reg.request_id,
            Self::ChainPending(pending) => pending.request_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub request_id: Uuid,
    pub record: Record,
    pub receipt: Receipt,
}

/// Everything needed to find a registration once its transaction lands.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRegistration {
    pub request_id: Uuid,
    pub tx_hash: TxHash,
    pub doc_hash: ContentHash,
    pub storage_location: StorageLocation,
    pub target: RegistrationTarget,
    pub submitted_at: DateTime<Utc>,
}

/// Result of re-hashing a stored blob against its record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub record: Record,
    /// Hash of the bytes the store returned.
    pub actual: ContentHash,
}

impl Verification {
    /// The stored bytes still hash to the on-ledger hash.
    pub fn is_intact(&self) -> bool {
        self.actual == self.record.doc_hash
    }
}
