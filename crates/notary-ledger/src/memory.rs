use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use notary_codec::RecordCodec;
use notary_crypto::Signer;
use notary_types::{Address, ContentHash, DocumentId, Record, Version};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::call::{ContractCall, ContractQuery};
use crate::error::{LedgerError, LedgerResult};
use crate::fees::{FeePolicy, DEFAULT_GAS_PRICE};
use crate::nonce::NonceSequencer;
use crate::traits::LedgerGateway;
use crate::tx::{SignedTransaction, TxHash, UnsignedTransaction};
use crate::types::{PendingTx, Receipt, TxStatus};

/// Flat cost of every transaction.
pub const INTRINSIC_GAS: u64 = 21_000;
/// Cost per byte of call data.
pub const CALLDATA_BYTE_GAS: u64 = 16;
/// Cost per 32-byte word of contract storage written.
pub const STORAGE_WORD_GAS: u64 = 20_000;

pub const REVERT_HASH_TAKEN: &str = "document hash already registered";
pub const REVERT_UNKNOWN_ID: &str = "unknown document id";
pub const REVERT_NOT_OWNER: &str = "caller is not the document owner";
pub const REVERT_OUT_OF_GAS: &str = "out of gas";
pub const REVERT_BAD_CALL: &str = "invalid call data";

/// When accepted transactions are mined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MiningMode {
    /// Every accepted transaction is mined into its own block immediately.
    #[default]
    Instant,
    /// Transactions wait in the mempool until [`InMemoryChain::mine_block`].
    Manual,
}

/// Simulated ledger running the document registry contract.
///
/// Checks signatures, chain id, nonces and gas the way a real node would,
/// and keeps every version of every document. Intended for tests, demos and
/// embedding.
pub struct InMemoryChain {
    chain_id: u64,
    contract: Address,
    mode: MiningMode,
    inner: RwLock<ChainState>,
    head: watch::Sender<u64>,
}

#[derive(Default)]
struct ChainState {
    /// Next nonce per account, counting mined transactions only.
    nonces: HashMap<Address, u64>,
    mempool: Vec<SignedTransaction>,
    receipts: HashMap<TxHash, Receipt>,
    block_number: u64,
    block_time: u64,
    registry: RegistryState,
}

#[derive(Default)]
struct RegistryState {
    last_id: u64,
    by_hash: HashMap<ContentHash, DocumentId>,
    versions: HashMap<DocumentId, Vec<Record>>,
}

impl InMemoryChain {
    pub fn new(chain_id: u64, contract: Address, mode: MiningMode) -> Self {
        let (head, _) = watch::channel(0);
        Self {
            chain_id,
            contract,
            mode,
            inner: RwLock::new(ChainState::default()),
            head,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn contract_address(&self) -> Address {
        self.contract
    }

    pub fn mode(&self) -> MiningMode {
        self.mode
    }

    /// Nonce the next transaction from `account` must carry, counting the
    /// mempool.
    pub fn pending_nonce(&self, account: &Address) -> LedgerResult<u64> {
        let state = self.read()?;
        Ok(Self::pending_nonce_in(&state, account))
    }

    pub fn block_number(&self) -> LedgerResult<u64> {
        Ok(self.read()?.block_number)
    }

    pub fn pending_count(&self) -> LedgerResult<usize> {
        Ok(self.read()?.mempool.len())
    }

    /// Number of lineages created so far.
    pub fn document_count(&self) -> LedgerResult<u64> {
        Ok(self.read()?.registry.last_id)
    }

    /// Current gas price quote.
    pub fn gas_price(&self) -> u64 {
        DEFAULT_GAS_PRICE
    }

    /// Watch the head block number.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.head.subscribe()
    }

    /// Admit a signed transaction to the mempool.
    ///
    /// Rejections here mean the transaction was not accepted at all and its
    /// nonce is still free.
    pub fn submit(&self, tx: SignedTransaction) -> LedgerResult<TxHash> {
        let hash = tx.hash;
        {
            let mut state = self.write()?;
            self.admit(&state, &tx)?;
            debug!(tx = %hash, nonce = tx.transaction.nonce, "transaction admitted");
            state.mempool.push(tx);
        }
        if self.mode == MiningMode::Instant {
            self.mine_block()?;
        }
        Ok(hash)
    }

    /// Mine every pending transaction into one new block.
    pub fn mine_block(&self) -> LedgerResult<u64> {
        let number = {
            let mut state = self.write()?;
            let number = state.block_number + 1;
            let time = next_block_time(state.block_time);
            let pending = std::mem::take(&mut state.mempool);
            for tx in &pending {
                let receipt = Self::execute(&mut state, tx, number, time);
                match &receipt.status {
                    TxStatus::Success => {
                        debug!(tx = %tx.hash, block = number, gas = receipt.gas_used, "tx succeeded");
                    }
                    TxStatus::Reverted { reason } => {
                        debug!(tx = %tx.hash, block = number, %reason, "tx reverted");
                    }
                }
                state.receipts.insert(tx.hash, receipt);
            }
            state.block_number = number;
            state.block_time = time;
            info!(block = number, txs = pending.len(), "mined block");
            number
        };
        self.head.send_replace(number);
        Ok(number)
    }

    pub fn receipt(&self, hash: &TxHash) -> LedgerResult<Option<Receipt>> {
        Ok(self.read()?.receipts.get(hash).cloned())
    }

    /// Execute a read-only call against mined state.
    pub fn call(&self, to: &Address, data: &[u8]) -> LedgerResult<Vec<u8>> {
        if *to != self.contract {
            return Err(LedgerError::CallReverted(format!("no contract at {to}")));
        }
        let query = ContractQuery::decode(data)
            .map_err(|e| LedgerError::CallReverted(format!("{REVERT_BAD_CALL}: {e}")))?;
        let state = self.read()?;
        let registry = &state.registry;
        Ok(match query {
            ContractQuery::LookupByHash(hash) => notary_codec::encode_uint(
                registry.by_hash.get(&hash).map(DocumentId::get).unwrap_or(0),
            ),
            ContractQuery::GetLatest(id) => registry
                .versions
                .get(&id)
                .and_then(|v| v.last())
                .map(RecordCodec::encode_record)
                .unwrap_or_else(RecordCodec::empty_record),
            ContractQuery::GetVersion(id, version) => registry
                .versions
                .get(&id)
                .and_then(|v| {
                    let index = usize::try_from(version.get()).ok()?.checked_sub(1)?;
                    v.get(index)
                })
                .map(RecordCodec::encode_record)
                .unwrap_or_else(RecordCodec::empty_record),
        })
    }

    /// Gas a call would use if executed now.
    pub fn estimate_gas(&self, from: &Address, data: &[u8]) -> LedgerResult<u64> {
        let call = ContractCall::decode(data)
            .map_err(|e| LedgerError::CallReverted(format!("{REVERT_BAD_CALL}: {e}")))?;
        let state = self.read()?;
        let owner_ok = match &call {
            ContractCall::AddDocument { .. } => true,
            ContractCall::AddVersion { id, .. } => state
                .registry
                .versions
                .get(id)
                .and_then(|v| v.last())
                .is_some_and(|r| r.owner == *from),
        };
        if !owner_ok {
            return Err(LedgerError::CallReverted(REVERT_NOT_OWNER.into()));
        }
        Ok(base_gas(data) + storage_gas(&call))
    }

    fn admit(&self, state: &ChainState, tx: &SignedTransaction) -> LedgerResult<()> {
        let reject = |reason: String| Err(LedgerError::SubmissionRejected(reason));
        let body = &tx.transaction;

        if let Err(e) = tx.verify() {
            return reject(e.to_string());
        }
        if body.chain_id != self.chain_id {
            return reject(format!(
                "wrong chain id: expected {}, got {}",
                self.chain_id, body.chain_id
            ));
        }
        if body.to != self.contract {
            return reject(format!("no contract at {}", body.to));
        }
        let known = state.receipts.contains_key(&tx.hash)
            || state.mempool.iter().any(|queued| queued.hash == tx.hash);
        if known {
            return reject("transaction already known".into());
        }
        let expected = Self::pending_nonce_in(state, &body.from);
        if body.nonce < expected {
            return reject(format!(
                "nonce too low: expected {expected}, got {}",
                body.nonce
            ));
        }
        if body.nonce > expected {
            return reject(format!(
                "nonce too high: expected {expected}, got {}",
                body.nonce
            ));
        }
        let intrinsic = base_gas(&body.call_data);
        if body.gas_limit < intrinsic {
            return reject(format!(
                "intrinsic gas too low: need {intrinsic}, limit {}",
                body.gas_limit
            ));
        }
        Ok(())
    }

    fn execute(state: &mut ChainState, tx: &SignedTransaction, block: u64, time: u64) -> Receipt {
        let body = &tx.transaction;
        *state.nonces.entry(body.from).or_insert(0) += 1;

        let base = base_gas(&body.call_data);
        let (status, gas_used) = match ContractCall::decode(&body.call_data) {
            Err(_) => (revert(REVERT_BAD_CALL), base),
            Ok(call) => match Self::check_rules(&state.registry, &call, &body.from) {
                Err(reason) => (revert(reason), base),
                Ok(()) => {
                    let gas = base + storage_gas(&call);
                    if gas > body.gas_limit {
                        (revert(REVERT_OUT_OF_GAS), body.gas_limit)
                    } else {
                        Self::apply(&mut state.registry, call, body.from, time);
                        (TxStatus::Success, gas)
                    }
                }
            },
        };

        Receipt {
            tx_hash: tx.hash,
            block_number: block,
            block_time: time,
            gas_used,
            status,
        }
    }

    fn check_rules(
        registry: &RegistryState,
        call: &ContractCall,
        sender: &Address,
    ) -> Result<(), &'static str> {
        if registry.by_hash.contains_key(&call.doc_hash()) {
            return Err(REVERT_HASH_TAKEN);
        }
        if let ContractCall::AddVersion { id, .. } = call {
            let latest = registry
                .versions
                .get(id)
                .and_then(|v| v.last())
                .ok_or(REVERT_UNKNOWN_ID)?;
            if latest.owner != *sender {
                return Err(REVERT_NOT_OWNER);
            }
        }
        Ok(())
    }

    fn apply(registry: &mut RegistryState, call: ContractCall, sender: Address, time: u64) {
        let (id, version, doc_hash, storage_location, metadata) = match call {
            ContractCall::AddDocument {
                doc_hash,
                storage_location,
                metadata,
            } => {
                registry.last_id += 1;
                let id = DocumentId::new(registry.last_id);
                (id, Version::FIRST, doc_hash, storage_location, metadata)
            }
            ContractCall::AddVersion {
                id,
                doc_hash,
                storage_location,
                metadata,
            } => {
                let next = registry
                    .versions
                    .get(&id)
                    .and_then(|v| v.last())
                    .map(|r| r.version.next())
                    .unwrap_or(Version::FIRST);
                (id, next, doc_hash, storage_location, metadata)
            }
        };
        registry.by_hash.insert(doc_hash, id);
        registry.versions.entry(id).or_default().push(Record {
            id,
            doc_hash,
            storage_location,
            issuer: metadata.issuer,
            date_issued: metadata.date_issued,
            verifier: metadata.verifier,
            owner: sender,
            version,
            created_at: time,
        });
    }

    fn pending_nonce_in(state: &ChainState, account: &Address) -> u64 {
        let mined = state.nonces.get(account).copied().unwrap_or(0);
        let queued = state
            .mempool
            .iter()
            .filter(|tx| tx.transaction.from == *account)
            .count() as u64;
        mined + queued
    }

    fn read(&self) -> LedgerResult<std::sync::RwLockReadGuard<'_, ChainState>> {
        self.inner
            .read()
            .map_err(|_| LedgerError::State("chain read lock poisoned".into()))
    }

    fn write(&self) -> LedgerResult<std::sync::RwLockWriteGuard<'_, ChainState>> {
        self.inner
            .write()
            .map_err(|_| LedgerError::State("chain write lock poisoned".into()))
    }
}

impl std::fmt::Debug for InMemoryChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryChain")
            .field("chain_id", &self.chain_id)
            .field("contract", &self.contract)
            .field("mode", &self.mode)
            .finish()
    }
}

fn revert(reason: &str) -> TxStatus {
    TxStatus::Reverted {
        reason: reason.to_string(),
    }
}

fn base_gas(call_data: &[u8]) -> u64 {
    INTRINSIC_GAS + CALLDATA_BYTE_GAS * call_data.len() as u64
}

/// Storage written by a call: the encoded record plus the hash index slot.
fn storage_gas(call: &ContractCall) -> u64 {
    let (storage_location, metadata) = match call {
        ContractCall::AddDocument {
            storage_location,
            metadata,
            ..
        }
        | ContractCall::AddVersion {
            storage_location,
            metadata,
            ..
        } => (storage_location, metadata),
    };
    let string_words: u64 = [
        storage_location.as_str().len(),
        metadata.issuer.len(),
        metadata.verifier.len(),
    ]
    .iter()
    .map(|len| 1 + len.div_ceil(notary_codec::WORD) as u64)
    .sum();
    let record_words = notary_codec::contract::RECORD_TUPLE.len() as u64 + string_words;
    (record_words + 1) * STORAGE_WORD_GAS
}

/// Block time in unix seconds; strictly greater than the previous block's.
fn next_block_time(previous: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    now.max(previous + 1)
}

/// [`LedgerGateway`] over an [`InMemoryChain`], signing with a local key.
pub struct InMemoryGateway {
    chain: Arc<InMemoryChain>,
    signer: Arc<dyn Signer>,
    nonces: NonceSequencer,
    fees: FeePolicy,
}

impl InMemoryGateway {
    pub fn new(chain: Arc<InMemoryChain>, signer: Arc<dyn Signer>) -> Self {
        Self {
            chain,
            signer,
            nonces: NonceSequencer::new(),
            fees: FeePolicy::default(),
        }
    }

    pub fn with_fees(mut self, fees: FeePolicy) -> Self {
        self.fees = fees;
        self
    }

    pub fn chain(&self) -> &Arc<InMemoryChain> {
        &self.chain
    }
}

#[async_trait]
impl LedgerGateway for InMemoryGateway {
    fn signer_address(&self) -> Address {
        self.signer.address()
    }

    async fn submit(&self, call: ContractCall) -> LedgerResult<PendingTx> {
        let call_data = call.encode()?;
        let from = self.signer.address();
        let chain = &self.chain;

        let guard = self
            .nonces
            .reserve(move || async move { chain.pending_nonce(&from) })
            .await?;
        let fees = self
            .fees
            .resolve(async { chain.estimate_gas(&from, &call_data) }, async {
                Ok(chain.gas_price())
            })
            .await;

        let nonce = guard.nonce();
        let signed = UnsignedTransaction {
            chain_id: chain.chain_id(),
            to: chain.contract_address(),
            from,
            nonce,
            gas_limit: fees.gas_limit,
            gas_price: fees.gas_price,
            call_data,
        }
        .sign(self.signer.as_ref())?;

        match chain.submit(signed) {
            Ok(tx_hash) => {
                guard.commit();
                info!(tx = %tx_hash, nonce, function = call.function().name, "submitted transaction");
                Ok(PendingTx {
                    tx_hash,
                    from,
                    nonce,
                    function: call.function().name.to_string(),
                })
            }
            Err(e) => {
                warn!(error = %e, nonce, "broadcast rejected");
                guard.invalidate();
                Err(e)
            }
        }
    }

    async fn confirm(&self, pending: &PendingTx, timeout: Duration) -> LedgerResult<Receipt> {
        let mut head = self.chain.subscribe();
        let wait = async {
            loop {
                if let Some(receipt) = self.chain.receipt(&pending.tx_hash)? {
                    return Ok::<Receipt, LedgerError>(receipt);
                }
                head.changed()
                    .await
                    .map_err(|_| LedgerError::State("chain stopped producing blocks".into()))?;
            }
        };

        let receipt = match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(LedgerError::TxTimeout {
                    tx_hash: pending.tx_hash,
                    waited: timeout,
                })
            }
        };
        match receipt.status {
            TxStatus::Success => Ok(receipt),
            TxStatus::Reverted { reason } => Err(LedgerError::TxFailed {
                tx_hash: pending.tx_hash,
                reason,
            }),
        }
    }

    async fn call(&self, query: ContractQuery) -> LedgerResult<Vec<u8>> {
        let data = query.encode()?;
        self.chain.call(&self.chain.contract_address(), &data)
    }
}

impl std::fmt::Debug for InMemoryGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryGateway")
            .field("chain", &self.chain)
            .field("signer", &self.signer.address())
            .field("fees", &self.fees)
            .finish()
    }
}
