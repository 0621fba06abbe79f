//! Cryptographic primitives for the document notary.
//!
//! Provides the streaming SHA-256 [`ContentAddresser`] that derives document
//! lookup keys, and the ed25519 [`Signer`] capability used to authorize
//! ledger transactions.
//!
//! All crypto operations wrap established libraries.

pub mod addresser;
pub mod signer;

pub use addresser::{AddresserError, ContentAddresser, CHUNK_SIZE};
pub use signer::{address_of, Signature, SignatureError, Signer, SigningKey, VerifyingKey};
