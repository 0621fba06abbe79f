use std::fmt;
use std::io;

use notary_codec::CodecError;
use notary_ledger::{LedgerError, TxHash};
use notary_store::StorageError;
use notary_types::{ContentHash, DocumentId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Step of the registration pipeline an error belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Hashing,
    Storing,
    Submitting,
    Confirming,
    Resolving,
}

impl PipelineStage {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hashing => "hashing",
            Self::Storing => "storing",
            Self::Submitting => "submitting",
            Self::Confirming => "confirming",
            Self::Resolving => "resolving",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from registry operations.
///
/// A timed-out confirmation is not an error; see
/// [`RegistrationOutcome::ChainPending`](crate::RegistrationOutcome::ChainPending).
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("[{stage}] invalid input: {reason}")]
    InvalidInput {
        stage: PipelineStage,
        reason: String,
    },

    #[error("[hashing] cannot read document: {source}")]
    ReadError {
        #[source]
        source: io::Error,
    },

    /// Nothing was submitted to the ledger.
    #[error("[storing] {backend} store failed: {source}")]
    StorageFailed {
        backend: &'static str,
        #[source]
        source: StorageError,
    },

    /// Advisory pre-check found the hash already registered.
    #[error("[submitting] document {hash} is already registered as id {existing}")]
    DuplicateHash {
        hash: ContentHash,
        existing: DocumentId,
    },

    /// The ledger refused the transaction or was never reached. Broadcasts
    /// with an unknown outcome are reported as
    /// [`RegistrationOutcome::ChainPending`](crate::RegistrationOutcome::ChainPending).
    #[error("[submitting] transaction not accepted: {source}")]
    SubmitFailed {
        #[source]
        source: LedgerError,
    },

    /// The transaction was mined and reverted.
    #[error("[confirming] ledger rejected transaction {tx_hash}: {reason}")]
    ChainRejected { tx_hash: TxHash, reason: String },

    #[error("[resolving] malformed record from ledger: {source}")]
    MalformedRecord {
        #[source]
        source: CodecError,
    },

    /// A read-side ledger call failed.
    #[error("[{stage}] ledger call failed: {source}")]
    Ledger {
        stage: PipelineStage,
        #[source]
        source: LedgerError,
    },
}

impl RegistryError {
    /// Pipeline stage the failure happened in.
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::InvalidInput { stage, .. } | Self::Ledger { stage, .. } => *stage,
            Self::ReadError { .. } => PipelineStage::Hashing,
            Self::StorageFailed { .. } => PipelineStage::Storing,
            Self::DuplicateHash { .. } | Self::SubmitFailed { .. } => PipelineStage::Submitting,
            Self::ChainRejected { .. } => PipelineStage::Confirming,
            Self::MalformedRecord { .. } => PipelineStage::Resolving,
        }
    }

    /// `true` when the ledger state cannot have changed because of the
    /// failed operation.
    pub fn is_before_chain(&self) -> bool {
        match self {
            Self::SubmitFailed { source } => !source.may_have_landed(),
            _ => matches!(
                self.stage(),
                PipelineStage::Hashing | PipelineStage::Storing | PipelineStage::Submitting
            ),
        }
    }

    pub(crate) fn invalid(stage: PipelineStage, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            stage,
            reason: reason.into(),
        }
    }

    pub(crate) fn ledger(stage: PipelineStage, source: LedgerError) -> Self {
        match source {
            LedgerError::Codec(source) => Self::MalformedRecord { source },
            source => Self::Ledger { stage, source },
        }
    }
}

impl From<CodecError> for RegistryError {
    fn from(source: CodecError) -> Self {
        Self::MalformedRecord { source }
    }
}

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
