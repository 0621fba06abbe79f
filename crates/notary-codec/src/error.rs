/// Errors produced while encoding or decoding ledger data.
///
/// Any of these on a decoded record means the ledger returned something the
/// registry cannot trust.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("truncated input: need {needed} bytes, have {actual}")]
    Truncated { needed: usize, actual: usize },

    #[error("word {index}: uint does not fit in 64 bits")]
    UintOverflow { index: usize },

    #[error("word {index}: address has non-zero high bytes")]
    DirtyAddress { index: usize },

    #[error("argument {index}: string offset {offset}, expected {expected}")]
    BadOffset {
        index: usize,
        offset: u64,
        expected: usize,
    },

    #[error("argument {index}: string is not valid UTF-8")]
    InvalidUtf8 { index: usize },

    #[error("argument {index}: non-zero padding after string")]
    DirtyPadding { index: usize },

    #[error("{extra} trailing bytes after encoded data")]
    TrailingBytes { extra: usize },

    #[error("unknown function selector 0x{0}")]
    UnknownSelector(String),

    #[error("{function}: expected {expected} arguments, got {actual}")]
    ArityMismatch {
        function: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{function} argument {index}: expected {expected}, got {actual}")]
    TypeMismatch {
        function: &'static str,
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
