//! Encoding between registry values and the ledger's call format.
//!
//! Everything the registry contract reads or returns travels as a sequence
//! of 32-byte big-endian words. Static values (`uint`, `bytes32`, `address`)
//! sit inline in the head; strings are a head offset pointing at a tail of
//! `length word + UTF-8 bytes`, zero-padded to the next word boundary.
//!
//! Decoding is strict: a buffer is accepted only if it is exactly what
//! [`abi::encode`] would have produced for the decoded values.
//!
//! - [`abi`] -- the word codec itself ([`Token`], [`ParamType`])
//! - [`call`] -- function selectors and [`CallData`]
//! - [`contract`] -- the registry contract's function table
//! - [`record`] -- [`RecordCodec`] for the nine-field version tuple

pub mod abi;
pub mod call;
pub mod contract;
pub mod error;
pub mod record;

pub use abi::{ParamType, Token, WORD};
pub use call::{decode_uint, encode_uint, CallData, FunctionSpec, SELECTOR_LEN};
pub use error::{CodecError, CodecResult};
pub use record::RecordCodec;
