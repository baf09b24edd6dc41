use thiserror::Error;

/// Reasons a single k-mer window cannot be encoded.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// The window contains a byte outside of `{A, C, G, T}`
    #[error("invalid base {base:?} at offset {offset}, expected one of 'A', 'C', 'G', 'T'")]
    InvalidBase { base: char, offset: usize },

    /// The window is not exactly `k` bases long
    #[error("k-mer window has length {found}, expected {expected}")]
    WrongLength { expected: usize, found: usize },
}

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum KmerError {
    #[error("invalid k-mer: {0}")]
    InvalidBase(#[from] EncodeError),

    #[error("k-mer size {k} is not supported, the maximum is {max}")]
    KmerTooLarge { k: usize, max: usize },

    #[error("no sequence produced a valid k-mer window")]
    EmptyInput,

    #[error("dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("corrupt matrix file: {0}")]
    CorruptFile(String),

    #[error("{what} = {value} does not fit in the 32-bit matrix format")]
    TooLargeToSerialize { what: &'static str, value: usize },

    #[error("job ordering violated: {0}")]
    JobOrder(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KmerError>;
