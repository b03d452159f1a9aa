//! Error types for the transaction service
//!
//! Provides a unified error type for start-up, configuration and wire decoding.
//! Per-transaction failures are not Rust errors: they are reported to the
//! requester as a [`ResultCode`](crate::protocol::ResultCode).

use thiserror::Error;

/// Result type alias using TsvcError
pub type Result<T> = std::result::Result<T, TsvcError>;

/// Unified error type for transaction service operations
#[derive(Debug, Error)]
pub enum TsvcError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
