use sha2::{Digest, Sha256};

use crate::abi::{self, ParamType, Token};
use crate::error::{CodecError, CodecResult};

/// Bytes of call data that select the function.
pub const SELECTOR_LEN: usize = 4;

/// Static description of one contract function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub inputs: &'static [ParamType],
    pub outputs: &'static [ParamType],
    /// `false` for read-only queries.
    pub mutates: bool,
}

impl FunctionSpec {
    /// Canonical signature, e.g. `lookupByHash(bytes32)`.
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.inputs.iter().map(ParamType::canonical_name).collect();
        format!("{}({})", self.name, params.join(","))
    }

    /// First four bytes of the SHA-256 of the signature.
    pub fn selector(&self) -> [u8; SELECTOR_LEN] {
        let digest = Sha256::digest(self.signature().as_bytes());
        let mut selector = [0u8; SELECTOR_LEN];
        selector.copy_from_slice(&digest[..SELECTOR_LEN]);
        selector
    }

    /// Decode a result produced by this function.
    pub fn decode_output(&self, data: &[u8]) -> CodecResult<Vec<Token>> {
        abi::decode(self.outputs, data)
    }
}

/// A function invocation: selector plus encoded arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallData {
    pub function: FunctionSpec,
    pub args: Vec<Token>,
}

impl CallData {
    /// Build a call, checking the arguments against the function's inputs.
    pub fn new(function: FunctionSpec, args: Vec<Token>) -> CodecResult<Self> {
        if args.len() != function.inputs.len() {
            return Err(CodecError::ArityMismatch {
                function: function.name,
                expected: function.inputs.len(),
                actual: args.len(),
            });
        }
        for (index, (arg, expected)) in args.iter().zip(function.inputs).enumerate() {
            let actual = arg.param_type();
            if actual != *expected {
                return Err(CodecError::TypeMismatch {
                    function: function.name,
                    index,
                    expected: expected.canonical_name(),
                    actual: actual.canonical_name(),
                });
            }
        }
        Ok(Self { function, args })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.function.selector().to_vec();
        out.extend_from_slice(&abi::encode(&self.args));
        out
    }

    /// Decode call data against a table of known functions.
    pub fn decode(data: &[u8], functions: &[FunctionSpec]) -> CodecResult<Self> {
        if data.len() < SELECTOR_LEN {
            return Err(CodecError::Truncated {
                needed: SELECTOR_LEN,
                actual: data.len(),
            });
        }
        let (selector, body) = data.split_at(SELECTOR_LEN);
        let function = functions
            .iter()
            .find(|f| f.selector() == selector)
            .copied()
            .ok_or_else(|| CodecError::UnknownSelector(hex::encode(selector)))?;
        let args = abi::decode(function.inputs, body)?;
        Ok(Self { function, args })
    }
}

/// Encode a single-`uint` result.
pub fn encode_uint(value: u64) -> Vec<u8> {
    abi::uint_word(value).to_vec()
}

/// Decode a single-`uint` result.
pub fn decode_uint(data: &[u8]) -> CodecResult<u64> {
    let tokens = abi::decode(&[ParamType::Uint], data)?;
    tokens
        .first()
        .and_then(Token::as_uint)
        .ok_or(CodecError::Truncated {
            needed: abi::WORD,
            actual: data.len(),
        })
}
