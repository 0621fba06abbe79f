use std::time::Duration;

use notary_codec::CodecError;

use crate::tx::TxHash;

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The transaction was mined but reverted.
    #[error("transaction {tx_hash} failed: {reason}")]
    TxFailed { tx_hash: TxHash, reason: String },

    /// No receipt appeared before the deadline. The transaction may still land.
    #[error("transaction {tx_hash} not confirmed within {waited:?}")]
    TxTimeout { tx_hash: TxHash, waited: Duration },

    /// The ledger refused the broadcast; nothing was accepted.
    #[error("transaction rejected at broadcast: {0}")]
    SubmissionRejected(String),

    /// The broadcast may have reached the ledger but no usable answer came
    /// back. The transaction can still land under `tx_hash`.
    #[error("outcome of broadcast {tx_hash} unknown: {reason}")]
    BroadcastUnknown { tx_hash: TxHash, reason: String },

    #[error("ledger unreachable: {0}")]
    Unavailable(String),

    #[error("ledger rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// A read-only call reverted.
    #[error("call reverted: {0}")]
    CallReverted(String),

    #[error("invalid response from ledger: {0}")]
    InvalidResponse(String),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("invalid signature: {0}")]
    Signature(String),

    #[error("invalid contract manifest: {0}")]
    Manifest(String),

    #[error("ledger configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("ledger state error: {0}")]
    State(String),
}

impl LedgerError {
    /// `true` for errors a broadcast can end with, after which the cached
    /// nonce can no longer be trusted.
    pub fn is_broadcast_failure(&self) -> bool {
        matches!(
            self,
            Self::SubmissionRejected(_)
                | Self::BroadcastUnknown { .. }
                | Self::Unavailable(_)
                | Self::Rpc { .. }
        )
    }

    /// `true` when the ledger may hold the transaction despite the error.
    pub fn may_have_landed(&self) -> bool {
        matches!(self, Self::BroadcastUnknown { .. } | Self::TxTimeout { .. })
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
