use notary_types::Address;
use serde::{Deserialize, Serialize};

use crate::tx::TxHash;

/// A broadcast transaction that has not been confirmed yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTx {
    pub tx_hash: TxHash,
    pub from: Address,
    pub nonce: u64,
    /// Contract function invoked, e.g. `addDocument`.
    pub function: String,
}

/// Execution result of a mined transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TxStatus {
    Success,
    Reverted {
        #[serde(rename = "revertReason")]
        reason: String,
    },
}

impl TxStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TxStatus::Success)
    }
}

/// Receipt of a mined transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    #[serde(rename = "transactionHash")]
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// Block time in unix seconds.
    pub block_time: u64,
    pub gas_used: u64,
    #[serde(flatten)]
    pub status: TxStatus,
}
