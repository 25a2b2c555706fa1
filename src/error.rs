//! Error types for the pair sniper

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the sniper bot
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    // Chain / RPC errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC connection failed: {0}")]
    RpcConnection(String),

    #[error("Contract call failed: {0}")]
    ContractCall(String),

    // Trading errors
    #[error("Transaction send failed: {0}")]
    TransactionSend(String),

    #[error("Transaction reverted: {0}")]
    TransactionReverted(String),

    #[error("Transaction submission not acknowledged after {0}s")]
    SubmissionTimeout(u64),

    #[error("Transaction not confirmed after {0}s")]
    ConfirmationTimeout(u64),

    // External API errors
    #[error("Oracle request failed: {0}")]
    Oracle(String),

    #[error("Notification delivery failed: {0}")]
    Notification(String),

    // Ledger errors
    #[error("Ledger I/O failed: {0}")]
    LedgerIo(String),

    #[error("Ledger is corrupt: {0}")]
    LedgerCorrupt(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Rpc(_)
                | Error::RpcConnection(_)
                | Error::Oracle(_)
                | Error::Notification(_)
        )
    }

    /// Check if this error happened after a transaction may have been broadcast
    pub fn is_post_broadcast(&self) -> bool {
        matches!(
            self,
            Error::TransactionReverted(_)
                | Error::SubmissionTimeout(_)
                | Error::ConfirmationTimeout(_)
        )
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

// Conversion from HTTP client errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Oracle(e.to_string())
    }
}

// Conversion from ethers provider errors
impl From<ethers::providers::ProviderError> for Error {
    fn from(e: ethers::providers::ProviderError) -> Self {
        Error::Rpc(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::Rpc("timeout".into()).is_retryable());
        assert!(Error::Oracle("429".into()).is_retryable());
        assert!(!Error::TransactionReverted("0xabc".into()).is_retryable());
        assert!(!Error::LedgerCorrupt("bad json".into()).is_retryable());
    }

    #[test]
    fn test_post_broadcast_classification() {
        assert!(Error::ConfirmationTimeout(300).is_post_broadcast());
        assert!(Error::SubmissionTimeout(30).is_post_broadcast());
        assert!(!Error::TransactionSend("nonce too low".into()).is_post_broadcast());
    }
}
