//! Error types for the ledger core

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Invalid seed length: expected {expected} bytes, got {got}")]
    InvalidSeedLength { expected: usize, got: usize },

    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("Invalid block signature: {0}")]
    InvalidBlockSignature(String),

    #[error("Invalid previous block hash: expected {expected}, got {got}")]
    InvalidPrevHash { expected: String, got: String },

    #[error("Invalid block height: expected {expected}, got {got}")]
    InvalidHeight { expected: u64, got: u64 },

    #[error("Invalid Merkle root")]
    InvalidMerkleRoot,

    #[error("Input {input} of tx {tx} carries no signature")]
    MissingSignature { tx: String, input: usize },

    #[error("Input {input} of tx {tx} has an invalid signature")]
    InvalidTransactionSignature { tx: String, input: usize },

    #[error("Input {input} of tx {tx} references unknown UTXO {key}")]
    UnknownUtxo { tx: String, input: usize, key: String },

    #[error("Input {input} of tx {tx} spends UTXO {key} which is already spent")]
    DoubleSpend { tx: String, input: usize, key: String },

    #[error("Input {input} of tx {tx} is not signed by the owner of UTXO {key}")]
    UnauthorizedSpend { tx: String, input: usize, key: String },

    #[error("Insufficient funds in tx {tx}: inputs {inputs}, outputs {outputs}")]
    InsufficientFunds { tx: String, inputs: u64, outputs: u64 },

    #[error("Transaction {tx} is already on the ledger")]
    DuplicateTransaction { tx: String },

    #[error("Amount overflow in tx {tx}")]
    AmountOverflow { tx: String },

    #[error("Transaction too large: {size} bytes (max: {max})")]
    TransactionTooLarge { size: usize, max: usize },

    #[error("Height {requested} is out of range (chain height {height})")]
    HeightOutOfRange { requested: u64, height: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage inconsistency: {0}")]
    StorageInconsistency(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
