pub mod config;
pub use config::{Config, LoggingConfig, SnapshotConfig};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VdbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("filter error: {0}")]
    Parse(#[from] ParseError),
    #[error("snapshot format error: {0}")]
    Format(#[from] FormatError),
    #[error("config error: {0}")]
    Config(String),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, VdbError>;

/// Raised by the filter tokenizer. `position` is a byte offset into the filter text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at position {position}")]
pub struct LexError {
    pub message: String,
    pub position: usize,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("{message} at position {position}")]
    Syntax { message: String, position: usize },
    #[error("unknown column '{column}' at position {position}")]
    UnknownColumn { column: String, position: usize },
    #[error("type mismatch for column '{column}' at position {position}: expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
        position: usize,
    },
    #[error("empty IN list for column '{column}' at position {position}")]
    EmptyInList { column: String, position: usize },
}

impl ParseError {
    pub fn syntax(message: impl Into<String>, position: usize) -> Self {
        ParseError::Syntax {
            message: message.into(),
            position,
        }
    }

    pub fn position(&self) -> usize {
        match self {
            ParseError::Lex(e) => e.position,
            ParseError::Syntax { position, .. }
            | ParseError::UnknownColumn { position, .. }
            | ParseError::TypeMismatch { position, .. }
            | ParseError::EmptyInList { position, .. } => *position,
        }
    }
}

/// A persisted snapshot that is corrupt, partial, or does not match the expected shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("not a snapshot file (bad magic)")]
    BadMagic,
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("file truncated while reading {0}")]
    Truncated(&'static str),
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("checksum mismatch in chunk {chunk}")]
    ChecksumMismatch { chunk: u64 },
    #[error("chunk {chunk} holds {actual} rows, directory says {expected}")]
    ChunkRowMismatch { chunk: u64, expected: u64, actual: u64 },
    #[error("reconstructed {actual} rows, header declares {expected}")]
    RowCountMismatch { expected: u64, actual: u64 },
    #[error("missing or damaged trailer (partial file?)")]
    MissingTrailer,
    #[error("row {row} encodes to {encoded} bytes, above the {limit}-byte chunk limit")]
    RowTooLarge { row: usize, encoded: u64, limit: u64 },
    #[error("{0}")]
    Corrupt(String),
}
