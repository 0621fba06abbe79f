use std::time::Duration;

use async_trait::async_trait;
use notary_types::Address;

use crate::call::{ContractCall, ContractQuery};
use crate::error::LedgerResult;
use crate::types::{PendingTx, Receipt};

/// Boundary between the registry and the ledger holding the registry
/// contract.
///
/// Implementations must uphold:
/// - `submit` returns once the ledger has accepted the signed transaction
///   for inclusion, and never waits for a block.
/// - `confirm` returns [`LedgerError::TxFailed`](crate::LedgerError::TxFailed)
///   for a reverted transaction and
///   [`LedgerError::TxTimeout`](crate::LedgerError::TxTimeout) when the
///   deadline passes. Dropping the future does not retract the transaction.
/// - `call` reads the latest confirmed state and returns the raw encoded
///   result.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Address transactions are signed for.
    fn signer_address(&self) -> Address;

    /// Build, sign and broadcast a registry call.
    async fn submit(&self, call: ContractCall) -> LedgerResult<PendingTx>;

    /// Wait up to `timeout` for `pending` to be mined.
    async fn confirm(&self, pending: &PendingTx, timeout: Duration) -> LedgerResult<Receipt>;

    /// Run a read-only query.
    async fn call(&self, query: ContractQuery) -> LedgerResult<Vec<u8>>;
}
