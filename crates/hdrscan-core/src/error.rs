//! Error types for hdrscan

use thiserror::Error;

/// hdrscan error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tokenizer error: {0}")]
    Tokenize(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Header not found: {0}")]
    FileNotFound(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for hdrscan
pub type Result<T> = std::result::Result<T, Error>;
