use std::fmt;
use std::str::FromStr;

use notary_crypto::{address_of, Signature, Signer, VerifyingKey};
use notary_types::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{LedgerError, LedgerResult};

const TX_DOMAIN: &[u8] = b"notary-tx-v1:";

/// BLAKE3 hash identifying a signed transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash([u8; 32]);

impl TxHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> LedgerResult<Self> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)
            .map_err(|e| LedgerError::InvalidResponse(format!("bad tx hash `{s}`: {e}")))?;
        let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            LedgerError::InvalidResponse(format!("tx hash has {} bytes", bytes.len()))
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", &hex::encode(self.0)[..16])
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for TxHash {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for TxHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A contract call ready to be signed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTransaction {
    pub chain_id: u64,
    /// Contract address.
    pub to: Address,
    pub from: Address,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: u64,
    #[serde(with = "hex_bytes")]
    pub call_data: Vec<u8>,
}

impl UnsignedTransaction {
    /// Domain-separated canonical bytes covered by the signature.
    pub fn signing_bytes(&self) -> LedgerResult<Vec<u8>> {
        let body =
            serde_json::to_vec(self).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        let mut bytes = Vec::with_capacity(TX_DOMAIN.len() + body.len());
        bytes.extend_from_slice(TX_DOMAIN);
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Sign with `signer`, which must own the `from` address.
    pub fn sign(self, signer: &dyn Signer) -> LedgerResult<SignedTransaction> {
        if signer.address() != self.from {
            return Err(LedgerError::Signature(format!(
                "signer {} cannot sign for {}",
                signer.address(),
                self.from
            )));
        }
        let message = self.signing_bytes()?;
        let signature = signer.sign(&message);
        let hash = compute_hash(&message, &signature);
        Ok(SignedTransaction {
            transaction: self,
            public_key: hex::encode(signer.public_key()),
            signature,
            hash,
        })
    }
}

/// A signed transaction, in the form broadcast to the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    pub transaction: UnsignedTransaction,
    /// Hex ed25519 public key of the signer.
    pub public_key: String,
    pub signature: Signature,
    pub hash: TxHash,
}

impl SignedTransaction {
    /// Check the signature, the sender binding and the hash.
    pub fn verify(&self) -> LedgerResult<()> {
        let key_bytes: [u8; 32] = hex::decode(&self.public_key)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| LedgerError::Signature("malformed public key".into()))?;
        if address_of(&key_bytes) != self.transaction.from {
            return Err(LedgerError::Signature(
                "public key does not match sender".into(),
            ));
        }
        let key = VerifyingKey::from_bytes(key_bytes)
            .map_err(|e| LedgerError::Signature(e.to_string()))?;
        let message = self.transaction.signing_bytes()?;
        key.verify(&message, &self.signature)
            .map_err(|e| LedgerError::Signature(e.to_string()))?;
        if compute_hash(&message, &self.signature) != self.hash {
            return Err(LedgerError::Signature("transaction hash mismatch".into()));
        }
        Ok(())
    }
}

fn compute_hash(signing_bytes: &[u8], signature: &Signature) -> TxHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(signing_bytes);
    hasher.update(&signature.to_bytes());
    TxHash(*hasher.finalize().as_bytes())
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}
