//! JSON-RPC 2.0 gateway to a remote ledger node.
//!
//! | Method | Params | Result |
//! |--------|--------|--------|
//! | `ledger_getTransactionCount` | `[address, "pending"]` | next nonce |
//! | `ledger_estimateGas` | `[{from, to, data}]` | gas units |
//! | `ledger_gasPrice` | `[]` | price per gas unit |
//! | `ledger_sendTransaction` | `[signedTx]` | tx hash |
//! | `ledger_getTransactionReceipt` | `[txHash]` | receipt or `null` |
//! | `ledger_call` | `[{to, data}, "latest"]` | `0x`-hex result |
//!
//! Numbers travel as JSON numbers, byte strings as `0x`-prefixed hex.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use notary_crypto::Signer;
use notary_types::Address;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::call::{ContractCall, ContractQuery};
use crate::error::{LedgerError, LedgerResult};
use crate::fees::FeePolicy;
use crate::nonce::NonceSequencer;
use crate::traits::LedgerGateway;
use crate::tx::{SignedTransaction, TxHash, UnsignedTransaction};
use crate::types::{PendingTx, Receipt, TxStatus};

/// JSON-RPC error code nodes use for reverted execution.
const EXECUTION_REVERTED: i64 = 3;

/// Retries for read-only requests on transport errors. Broadcasts are never
/// retried.
const READ_RETRIES: u32 = 2;
const RETRY_BASE_DELAY_MS: u64 = 200;

#[derive(Serialize)]
struct RpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse<R> {
    #[serde(default = "Option::default")]
    result: Option<R>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CallObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<Address>,
    to: Address,
    data: String,
}

/// [`LedgerGateway`] speaking JSON-RPC to a ledger node.
pub struct RpcLedgerGateway {
    http: reqwest::Client,
    endpoint: Url,
    chain_id: u64,
    contract: Address,
    signer: Arc<dyn Signer>,
    nonces: NonceSequencer,
    fees: FeePolicy,
    poll_interval: Duration,
    next_id: AtomicU64,
}

impl RpcLedgerGateway {
    pub fn new(
        endpoint: Url,
        chain_id: u64,
        contract: Address,
        signer: Arc<dyn Signer>,
        request_timeout: Duration,
    ) -> LedgerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| LedgerError::Config(format!("http client: {e}")))?;
        Ok(Self {
            http,
            endpoint,
            chain_id,
            contract,
            signer,
            nonces: NonceSequencer::new(),
            fees: FeePolicy::default(),
            poll_interval: Duration::from_secs(1),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn with_fees(mut self, fees: FeePolicy) -> Self {
        self.fees = fees;
        self
    }

    /// Interval between receipt polls in [`confirm`](LedgerGateway::confirm).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn contract_address(&self) -> Address {
        self.contract
    }

    /// Next nonce for `account`, including pending transactions.
    pub async fn transaction_count(&self, account: Address) -> LedgerResult<u64> {
        self.request("ledger_getTransactionCount", (account, "pending"), true)
            .await
    }

    pub async fn estimate_gas(&self, call_data: &[u8]) -> LedgerResult<u64> {
        let call = CallObject {
            from: Some(self.signer.address()),
            to: self.contract,
            data: to_hex(call_data),
        };
        self.request("ledger_estimateGas", [call], true).await
    }

    pub async fn gas_price(&self) -> LedgerResult<u64> {
        self.request("ledger_gasPrice", [(); 0], true).await
    }

    pub async fn receipt(&self, tx_hash: &TxHash) -> LedgerResult<Option<Receipt>> {
        self.request_optional("ledger_getTransactionReceipt", [tx_hash], true)
            .await
    }

    /// Send a signed transaction.
    ///
    /// Only a JSON-RPC error answer or a refused connection prove the node
    /// kept nothing. Every other failure after the request left this process
    /// is [`LedgerError::BroadcastUnknown`]; broadcasts are never retried.
    async fn broadcast(&self, signed: &SignedTransaction) -> LedgerResult<TxHash> {
        const METHOD: &str = "ledger_sendTransaction";
        let unknown = |reason: String| LedgerError::BroadcastUnknown {
            tx_hash: signed.hash,
            reason,
        };

        let resp = match self.post(METHOD, [signed]).await {
            Ok(resp) => resp,
            Err(e) if e.is_connect() => {
                return Err(LedgerError::Unavailable(format!("{METHOD}: {e}")))
            }
            Err(e) => return Err(unknown(format!("{METHOD}: {e}"))),
        };
        let returned: TxHash = match Self::read_response(METHOD, resp).await {
            Ok(Some(hash)) => hash,
            Ok(None) => return Err(unknown(format!("{METHOD}: missing result"))),
            Err(LedgerError::Rpc { message, .. }) => {
                return Err(LedgerError::SubmissionRejected(message))
            }
            Err(e) => return Err(unknown(e.to_string())),
        };
        if returned != signed.hash {
            return Err(unknown(format!(
                "node reported hash {returned}, expected {}",
                signed.hash
            )));
        }
        Ok(returned)
    }

    async fn request<P, R>(&self, method: &str, params: P, retry: bool) -> LedgerResult<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        self.request_optional(method, params, retry)
            .await?
            .ok_or_else(|| LedgerError::InvalidResponse(format!("{method}: missing result")))
    }

    async fn request_optional<P, R>(
        &self,
        method: &str,
        params: P,
        retry: bool,
    ) -> LedgerResult<Option<R>>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let attempts = if retry { READ_RETRIES + 1 } else { 1 };

        let mut attempt = 0;
        let resp = loop {
            match self.post(method, &params).await {
                Ok(resp) => break resp,
                Err(e) if attempt + 1 < attempts => {
                    let delay = Duration::from_millis(RETRY_BASE_DELAY_MS * 2u64.pow(attempt));
                    warn!(method, attempt = attempt + 1, error = %e, "ledger request failed, retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(LedgerError::Unavailable(format!("{method}: {e}"))),
            }
        };
        Self::read_response(method, resp).await
    }

    async fn post<P: Serialize>(
        &self,
        method: &str,
        params: P,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        self.http.post(self.endpoint.clone()).json(&body).send().await
    }

    async fn read_response<R: DeserializeOwned>(
        method: &str,
        resp: reqwest::Response,
    ) -> LedgerResult<Option<R>> {
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(LedgerError::Unavailable(format!(
                "{method}: HTTP {status}: {text}"
            )));
        }

        let parsed: RpcResponse<R> = resp
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(format!("{method}: {e}")))?;
        if let Some(err) = parsed.error {
            debug!(method, code = err.code, message = %err.message, "rpc error");
            return Err(LedgerError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(parsed.result)
    }
}

#[async_trait]
impl LedgerGateway for RpcLedgerGateway {
    fn signer_address(&self) -> Address {
        self.signer.address()
    }

    async fn submit(&self, call: ContractCall) -> LedgerResult<PendingTx> {
        let call_data = call.encode()?;
        let from = self.signer.address();

        let guard = self
            .nonces
            .reserve(|| self.transaction_count(from))
            .await?;
        let fees = self
            .fees
            .resolve(self.estimate_gas(&call_data), self.gas_price())
            .await;

        let nonce = guard.nonce();
        let signed = UnsignedTransaction {
            chain_id: self.chain_id,
            to: self.contract,
            from,
            nonce,
            gas_limit: fees.gas_limit,
            gas_price: fees.gas_price,
            call_data,
        }
        .sign(self.signer.as_ref())?;

        match self.broadcast(&signed).await {
            Ok(tx_hash) => {
                guard.commit();
                info!(
                    tx = %tx_hash,
                    nonce,
                    gas_limit = fees.gas_limit,
                    function = call.function().name,
                    "broadcast transaction"
                );
                Ok(PendingTx {
                    tx_hash,
                    from,
                    nonce,
                    function: call.function().name.to_string(),
                })
            }
            Err(e) => {
                if e.may_have_landed() {
                    warn!(error = %e, nonce, "broadcast outcome unknown, nonce cache invalidated");
                } else {
                    warn!(error = %e, nonce, "broadcast failed, nonce cache invalidated");
                }
                guard.invalidate();
                Err(e)
            }
        }
    }

    async fn confirm(&self, pending: &PendingTx, timeout: Duration) -> LedgerResult<Receipt> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.receipt(&pending.tx_hash).await {
                Ok(Some(receipt)) => {
                    return match receipt.status {
                        TxStatus::Success => Ok(receipt),
                        TxStatus::Reverted { reason } => Err(LedgerError::TxFailed {
                            tx_hash: pending.tx_hash,
                            reason,
                        }),
                    };
                }
                Ok(None) => {}
                Err(e) => warn!(tx = %pending.tx_hash, error = %e, "receipt poll failed"),
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(LedgerError::TxTimeout {
                    tx_hash: pending.tx_hash,
                    waited: timeout,
                });
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn call(&self, query: ContractQuery) -> LedgerResult<Vec<u8>> {
        let call = CallObject {
            from: None,
            to: self.contract,
            data: to_hex(&query.encode()?),
        };
        let result: String = self
            .request("ledger_call", (call, "latest"), true)
            .await
            .map_err(|e| match e {
                LedgerError::Rpc { code, message } if code == EXECUTION_REVERTED => {
                    LedgerError::CallReverted(message)
                }
                other => other,
            })?;
        from_hex(&result)
    }
}

impl std::fmt::Debug for RpcLedgerGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedgerGateway")
            .field("endpoint", &self.endpoint.as_str())
            .field("chain_id", &self.chain_id)
            .field("contract", &self.contract)
            .field("signer", &self.signer.address())
            .finish()
    }
}

fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn from_hex(s: &str) -> LedgerResult<Vec<u8>> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
        .map_err(|e| LedgerError::InvalidResponse(format!("bad hex result: {e}")))
}
