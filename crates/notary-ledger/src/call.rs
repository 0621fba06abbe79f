use notary_codec::contract::{ADD_DOCUMENT, ADD_VERSION, GET_LATEST, GET_VERSION, LOOKUP_BY_HASH};
use notary_codec::{CallData, FunctionSpec, Token};
use notary_types::{ContentHash, DocumentId, DocumentMetadata, StorageLocation, Version};

use crate::error::{LedgerError, LedgerResult};

/// A state-changing registry call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContractCall {
    /// Start a new lineage at version 1.
    AddDocument {
        doc_hash: ContentHash,
        storage_location: StorageLocation,
        metadata: DocumentMetadata,
    },
    /// Append the next version to lineage `id`.
    AddVersion {
        id: DocumentId,
        doc_hash: ContentHash,
        storage_location: StorageLocation,
        metadata: DocumentMetadata,
    },
}

impl ContractCall {
    pub fn function(&self) -> FunctionSpec {
        match self {
            Self::AddDocument { .. } => ADD_DOCUMENT,
            Self::AddVersion { .. } => ADD_VERSION,
        }
    }

    pub fn doc_hash(&self) -> ContentHash {
        match self {
            Self::AddDocument { doc_hash, .. } | Self::AddVersion { doc_hash, .. } => *doc_hash,
        }
    }

    pub fn encode(&self) -> LedgerResult<Vec<u8>> {
        let (function, mut args) = match self {
            Self::AddDocument { .. } => (ADD_DOCUMENT, Vec::with_capacity(5)),
            Self::AddVersion { id, .. } => {
                let mut args = Vec::with_capacity(6);
                args.push(Token::Uint(id.get()));
                (ADD_VERSION, args)
            }
        };
        let (doc_hash, storage_location, metadata) = match self {
            Self::AddDocument {
                doc_hash,
                storage_location,
                metadata,
            }
            | Self::AddVersion {
                doc_hash,
                storage_location,
                metadata,
                ..
            } => (doc_hash, storage_location, metadata),
        };
        args.extend([
            Token::Bytes32(*doc_hash.as_bytes()),
            Token::String(storage_location.as_str().to_owned()),
            Token::String(metadata.issuer.clone()),
            Token::Uint(metadata.date_issued),
            Token::String(metadata.verifier.clone()),
        ]);
        Ok(CallData::new(function, args)?.encode())
    }

    pub fn decode(data: &[u8]) -> LedgerResult<Self> {
        let call = CallData::decode(data, &[ADD_DOCUMENT, ADD_VERSION])?;
        let (id, rest) = if call.function == ADD_VERSION {
            let id = call.args.first().and_then(Token::as_uint).ok_or_else(shape)?;
            (Some(DocumentId::new(id)), &call.args[1..])
        } else {
            (None, &call.args[..])
        };
        let [
            Token::Bytes32(hash),
            Token::String(location),
            Token::String(issuer),
            Token::Uint(date_issued),
            Token::String(verifier),
        ] = rest
        else {
            return Err(shape());
        };
        let doc_hash = ContentHash::from_digest(*hash);
        let storage_location = StorageLocation::from_ledger(location.clone());
        let metadata = DocumentMetadata::new(issuer.clone(), *date_issued, verifier.clone());
        Ok(match id {
            Some(id) => Self::AddVersion {
                id,
                doc_hash,
                storage_location,
                metadata,
            },
            None => Self::AddDocument {
                doc_hash,
                storage_location,
                metadata,
            },
        })
    }
}

/// A read-only registry query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContractQuery {
    /// Lineage id bound to a hash, `0` if none.
    LookupByHash(ContentHash),
    /// Highest version of a lineage, or the all-zero tuple.
    GetLatest(DocumentId),
    /// A specific version, or the all-zero tuple.
    GetVersion(DocumentId, Version),
}

impl ContractQuery {
    pub fn function(&self) -> FunctionSpec {
        match self {
            Self::LookupByHash(_) => LOOKUP_BY_HASH,
            Self::GetLatest(_) => GET_LATEST,
            Self::GetVersion(..) => GET_VERSION,
        }
    }

    pub fn encode(&self) -> LedgerResult<Vec<u8>> {
        let args = match self {
            Self::LookupByHash(hash) => vec![Token::Bytes32(*hash.as_bytes())],
            Self::GetLatest(id) => vec![Token::Uint(id.get())],
            Self::GetVersion(id, version) => {
                vec![Token::Uint(id.get()), Token::Uint(version.get())]
            }
        };
        Ok(CallData::new(self.function(), args)?.encode())
    }

    pub fn decode(data: &[u8]) -> LedgerResult<Self> {
        let call = CallData::decode(data, &[LOOKUP_BY_HASH, GET_LATEST, GET_VERSION])?;
        match (call.function.name, call.args.as_slice()) {
            ("lookupByHash", [Token::Bytes32(hash)]) => {
                Ok(Self::LookupByHash(ContentHash::from_digest(*hash)))
            }
            ("getLatest", [Token::Uint(id)]) => Ok(Self::GetLatest(DocumentId::new(*id))),
            ("getVersion", [Token::Uint(id), Token::Uint(version)]) => Ok(Self::GetVersion(
                DocumentId::new(*id),
                Version::new(*version),
            )),
            _ => Err(shape()),
        }
    }
}

fn shape() -> LedgerError {
    LedgerError::Serialization("call arguments do not match the registry function".into())
}
