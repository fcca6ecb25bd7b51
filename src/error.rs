//! Error types for the ledger engine

use thiserror::Error;

/// Coarse classification of a failure, independent of how it was wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Structural,
    Tamper,
    Ledger,
    Auth,
    Consensus,
    Admission,
    MiningExhausted,
    MiningCancelled,
    Config,
    Io,
    Serialization,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Malformed or missing fields.
    #[error("Malformed data: {0}")]
    Structural(String),

    /// A recomputed id, hash or Merkle root does not match the stored one.
    #[error("Tamper detected: {0}")]
    Tamper(String),

    /// Missing UTXO, duplicate input, non-positive output or inflation.
    #[error("{0}")]
    Ledger(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    /// PoW target not met, broken linkage or non-sequential index.
    #[error("Consensus violation: {0}")]
    Consensus(String),

    #[error("Admission rejected: {0}")]
    Admission(String),

    #[error("Nonce space exhausted after {attempts} attempts; vary the block and retry")]
    MiningExhausted { attempts: u64 },

    #[error("Mining cancelled after {attempts} attempts")]
    MiningCancelled { attempts: u64 },

    #[error("transaction {index} invalid: {source}")]
    BlockTransaction {
        index: usize,
        #[source]
        source: Box<ChainError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ChainError {
    /// Kind of the underlying failure, looking through block-level context.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChainError::Structural(_) => ErrorKind::Structural,
            ChainError::Tamper(_) => ErrorKind::Tamper,
            ChainError::Ledger(_) => ErrorKind::Ledger,
            ChainError::Auth(_) => ErrorKind::Auth,
            ChainError::Consensus(_) => ErrorKind::Consensus,
            ChainError::Admission(_) => ErrorKind::Admission,
            ChainError::MiningExhausted { .. } => ErrorKind::MiningExhausted,
            ChainError::MiningCancelled { .. } => ErrorKind::MiningCancelled,
            ChainError::BlockTransaction { source, .. } => source.kind(),
            ChainError::Config(_) => ErrorKind::Config,
            ChainError::Io(_) => ErrorKind::Io,
            ChainError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Mining failures are recoverable by retrying with a different block.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChainError::MiningExhausted { .. } | ChainError::MiningCancelled { .. }
        )
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
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
