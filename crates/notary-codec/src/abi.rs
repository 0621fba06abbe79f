use notary_types::Address;

use crate::error::{CodecError, CodecResult};

/// Width of one encoded word.
pub const WORD: usize = 32;

/// Type of one encoded value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Unsigned integer; only values that fit in `u64` are accepted.
    Uint,
    Bytes32,
    Address,
    /// UTF-8 string, encoded in the tail.
    String,
}

impl ParamType {
    /// Name used in function signatures and ABI files.
    pub const fn canonical_name(&self) -> &'static str {
        match self {
            ParamType::Uint => "uint256",
            ParamType::Bytes32 => "bytes32",
            ParamType::Address => "address",
            ParamType::String => "string",
        }
    }

    pub const fn is_dynamic(&self) -> bool {
        matches!(self, ParamType::String)
    }
}

/// One decoded value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Uint(u64),
    Bytes32([u8; 32]),
    Address(Address),
    String(String),
}

impl Token {
    pub fn param_type(&self) -> ParamType {
        match self {
            Token::Uint(_) => ParamType::Uint,
            Token::Bytes32(_) => ParamType::Bytes32,
            Token::Address(_) => ParamType::Address,
            Token::String(_) => ParamType::String,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Token::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes32(&self) -> Option<&[u8; 32]> {
        match self {
            Token::Bytes32(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Token::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Encode a sequence of tokens as head words followed by string tails.
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        match token {
            Token::Uint(v) => head.extend_from_slice(&uint_word(*v)),
            Token::Bytes32(b) => head.extend_from_slice(b),
            Token::Address(a) => head.extend_from_slice(&address_word(a)),
            Token::String(s) => {
                head.extend_from_slice(&uint_word((head_len + tail.len()) as u64));
                tail.extend_from_slice(&uint_word(s.len() as u64));
                tail.extend_from_slice(s.as_bytes());
                tail.resize(tail.len() + padding(s.len()), 0);
            }
        }
    }

    head.extend_from_slice(&tail);
    head
}

/// Decode `data` as the given types.
///
/// String tails must appear in argument order, back to back, directly after
/// the head. Anything else is rejected, so a given value list has exactly
/// one accepted encoding.
pub fn decode(types: &[ParamType], data: &[u8]) -> CodecResult<Vec<Token>> {
    let head_len = types.len() * WORD;
    if data.len() < head_len {
        return Err(CodecError::Truncated {
            needed: head_len,
            actual: data.len(),
        });
    }

    let mut end = head_len;
    let mut tokens = Vec::with_capacity(types.len());
    for (index, ty) in types.iter().enumerate() {
        let word = word_at(data, index * WORD)?;
        let token = match ty {
            ParamType::Uint => Token::Uint(word_to_u64(word, index)?),
            ParamType::Bytes32 => Token::Bytes32(*word),
            ParamType::Address => Token::Address(word_to_address(word, index)?),
            ParamType::String => {
                let offset = word_to_u64(word, index)?;
                if offset != end as u64 {
                    return Err(CodecError::BadOffset {
                        index,
                        offset,
                        expected: end,
                    });
                }
                let (s, next) = read_string(data, end, index)?;
                end = next;
                Token::String(s)
            }
        };
        tokens.push(token);
    }

    if data.len() != end {
        return Err(CodecError::TrailingBytes {
            extra: data.len() - end,
        });
    }
    Ok(tokens)
}

fn read_string(data: &[u8], at: usize, index: usize) -> CodecResult<(String, usize)> {
    let len_word = word_at(data, at)?;
    let len = word_to_u64(len_word, index)?;
    let len = usize::try_from(len).map_err(|_| CodecError::Truncated {
        needed: usize::MAX,
        actual: data.len(),
    })?;

    let start = at + WORD;
    let padded_end = start
        .checked_add(len)
        .and_then(|n| n.checked_add(padding(len)))
        .ok_or(CodecError::Truncated {
            needed: usize::MAX,
            actual: data.len(),
        })?;
    if data.len() < padded_end {
        return Err(CodecError::Truncated {
            needed: padded_end,
            actual: data.len(),
        });
    }

    if data[start + len..padded_end].iter().any(|b| *b != 0) {
        return Err(CodecError::DirtyPadding { index });
    }
    let s = std::str::from_utf8(&data[start..start + len])
        .map_err(|_| CodecError::InvalidUtf8 { index })?;
    Ok((s.to_owned(), padded_end))
}

fn word_at(data: &[u8], at: usize) -> CodecResult<&[u8; WORD]> {
    data.get(at..at + WORD)
        .and_then(|w| w.try_into().ok())
        .ok_or(CodecError::Truncated {
            needed: at + WORD,
            actual: data.len(),
        })
}

fn word_to_u64(word: &[u8; WORD], index: usize) -> CodecResult<u64> {
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(CodecError::UintOverflow { index });
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(low))
}

fn word_to_address(word: &[u8; WORD], index: usize) -> CodecResult<Address> {
    let split = WORD - Address::LEN;
    if word[..split].iter().any(|b| *b != 0) {
        return Err(CodecError::DirtyAddress { index });
    }
    let mut bytes = [0u8; Address::LEN];
    bytes.copy_from_slice(&word[split..]);
    Ok(Address::from_bytes(bytes))
}

pub(crate) fn uint_word(v: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&v.to_be_bytes());
    word
}

fn address_word(a: &Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - Address::LEN..].copy_from_slice(a.as_bytes());
    word
}

fn padding(len: usize) -> usize {
    (WORD - len % WORD) % WORD
}
