use notary_types::{ContentHash, DocumentId, Record, StorageLocation, Version};

use crate::abi::{self, Token};
use crate::contract::RECORD_TUPLE;
use crate::error::{CodecError, CodecResult};

/// Converts between [`Record`] and the ledger's encoded
/// `(id, docHash, ipfsCid, issuer, dateIssued, verifier, owner, version, createdAt)`
/// tuple.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecordCodec;

impl RecordCodec {
    pub fn encode_record(record: &Record) -> Vec<u8> {
        abi::encode(&[
            Token::Uint(record.id.get()),
            Token::Bytes32(*record.doc_hash.as_bytes()),
            Token::String(record.storage_location.as_str().to_owned()),
            Token::String(record.issuer.clone()),
            Token::Uint(record.date_issued),
            Token::String(record.verifier.clone()),
            Token::Address(record.owner),
            Token::Uint(record.version.get()),
            Token::Uint(record.created_at),
        ])
    }

    /// Decode a `getLatest`/`getVersion` result.
    ///
    /// The all-zero tuple decodes to a record with [`DocumentId::NONE`];
    /// callers check [`Record::is_empty`].
    pub fn decode_record(data: &[u8]) -> CodecResult<Record> {
        let tokens = abi::decode(RECORD_TUPLE, data)?;
        let Ok(
            [
                Token::Uint(id),
                Token::Bytes32(doc_hash),
                Token::String(location),
                Token::String(issuer),
                Token::Uint(date_issued),
                Token::String(verifier),
                Token::Address(owner),
                Token::Uint(version),
                Token::Uint(created_at),
            ],
        ) = <[Token; 9]>::try_from(tokens)
        else {
            return Err(CodecError::Truncated {
                needed: RECORD_TUPLE.len() * abi::WORD,
                actual: data.len(),
            });
        };

        Ok(Record {
            id: DocumentId::new(id),
            doc_hash: ContentHash::from_digest(doc_hash),
            storage_location: StorageLocation::from_ledger(location),
            issuer,
            date_issued,
            verifier,
            owner,
            version: Version::new(version),
            created_at,
        })
    }

    /// Encoding of the "no such document" tuple.
    pub fn empty_record() -> Vec<u8> {
        Self::encode_record(&Record {
            id: DocumentId::NONE,
            doc_hash: ContentHash::zero(),
            storage_location: StorageLocation::from_ledger(String::new()),
            issuer: String::new(),
            date_issued: 0,
            verifier: String::new(),
            owner: notary_types::Address::zero(),
            version: Version::new(0),
            created_at: 0,
        })
    }
}
