use std::io::{self, Read};

use notary_types::ContentHash;
use sha2::{Digest, Sha256};

/// Bytes read from the source per hashing step.
pub const CHUNK_SIZE: usize = 4096;

/// Streaming SHA-256 content addresser.
///
/// Reads its source in fixed [`CHUNK_SIZE`] chunks, so memory use does not
/// grow with document size. The digest is always exactly 32 bytes and is a
/// pure function of the input bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContentAddresser;

impl ContentAddresser {
    pub const fn new() -> Self {
        Self
    }

    /// Hash everything readable from `source`.
    ///
    /// Interrupted reads are retried; any other I/O failure is returned.
    pub fn hash_reader<R: Read>(&self, mut source: R) -> Result<ContentHash, AddresserError> {
        let mut hasher = Sha256::new();
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            let n = match source.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(AddresserError::Read(e)),
            };
            hasher.update(&chunk[..n]);
        }
        Ok(ContentHash::from_digest(hasher.finalize().into()))
    }

    /// Hash an in-memory document.
    pub fn hash_bytes(&self, data: &[u8]) -> ContentHash {
        let mut hasher = Sha256::new();
        for chunk in data.chunks(CHUNK_SIZE) {
            hasher.update(chunk);
        }
        ContentHash::from_digest(hasher.finalize().into())
    }

    /// Verify that `data` hashes to `expected`.
    pub fn verify(&self, data: &[u8], expected: &ContentHash) -> bool {
        self.hash_bytes(data) == *expected
    }
}

/// Errors from content addressing.
#[derive(Debug, thiserror::Error)]
pub enum AddresserError {
    #[error("failed to read document source: {0}")]
    Read(#[source] io::Error),
}
