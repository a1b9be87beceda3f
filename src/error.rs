//! Error types for TokenChain

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Cryptographic error: {0}")]
    CryptoError(String),
    #[error("Key mismatch: private key does not derive the entry's source identity")]
    KeyMismatch,
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Block {number} does not continue summary at height {summary_number}")]
    NotAContinuation { number: u64, summary_number: u64 },
    #[error("Unauthorized transfer of token {token} by {source_identity}")]
    UnauthorizedTransfer { token: String, source_identity: String },
    #[error("Unknown block handle {0}")]
    UnknownBlock(u64),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Bincode error: {0}")]
    BincodeError(#[from] Box<bincode::ErrorKind>),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Invalid hex: {0}")]
    HexError(#[from] hex::FromHexError),
    #[error("Invalid config file: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl From<rusqlite::Error> for ChainError {
    fn from(err: rusqlite::Error) -> Self {
        ChainError::DatabaseError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
