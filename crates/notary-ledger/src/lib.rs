//! Ledger gateway for the document notary.
//!
//! The registry contract lives on an append-only ledger. This crate is the
//! only place that knows how to talk to it: it builds and signs
//! transactions, sequences nonces per signer, waits for confirmation and
//! runs read-only queries. Everything above it sees the [`LedgerGateway`]
//! trait.
//!
//! # Gateways
//!
//! - [`InMemoryGateway`] over an [`InMemoryChain`] -- a simulated ledger that
//!   executes the registry contract, for tests and demos
//! - [`RpcLedgerGateway`] -- JSON-RPC 2.0 client for a remote ledger node
//!
//! # Submission Rules
//!
//! 1. Submissions from one signer are serialized by a [`NonceSequencer`];
//!    confirmation waits overlap freely.
//! 2. A broadcast failure invalidates the cached nonce so the next
//!    submission re-reads it from the ledger.
//! 3. `confirm` never resubmits. A timeout leaves the transaction in flight.

pub mod call;
pub mod config;
pub mod error;
pub mod fees;
pub mod manifest;
pub mod memory;
pub mod nonce;
pub mod rpc;
pub mod traits;
pub mod tx;
pub mod types;

pub use call::{ContractCall, ContractQuery};
pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult};
pub use fees::{FeePolicy, Fees};
pub use manifest::ContractManifest;
pub use memory::{InMemoryChain, InMemoryGateway, MiningMode};
pub use nonce::{NonceGuard, NonceSequencer};
pub use rpc::RpcLedgerGateway;
pub use traits::LedgerGateway;
pub use tx::{SignedTransaction, TxHash, UnsignedTransaction};
pub use types::{PendingTx, Receipt, TxStatus};
