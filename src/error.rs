//! Domain and transport error taxonomy.
//!
//! `LuxError` covers everything that comes back to a client as a `FAILED`
//! result (§7 of the spec). `TransportError` covers failures that tear the
//! connection down instead — they are never wrapped in a result record.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum LuxError {
    #[error("index already exists: {0}")]
    IndexAlreadyExists(String),

    #[error("index does not exist: {0}")]
    IndexDoesNotExist(String),

    #[error("unknown space: {0}")]
    UnknownSpace(String),

    #[error("not a command: {0}")]
    NotACommand(String),

    #[error("index not initialized: {0}")]
    IndexNotInitialized(String),

    #[error("capacity exceeded for {name}: would be {would_be}, max {max}")]
    CapacityExceeded { name: String, would_be: usize, max: usize },

    #[error("dimension mismatch for {name}: expected {expected}, got {got}")]
    DimensionMismatch { name: String, expected: usize, got: usize },

    #[error("unknown label {label} in index {name}")]
    UnknownLabel { name: String, label: i64 },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid token")]
    InvalidToken,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode failure: {0}")]
    EncodeFailure(String),

    #[error("decode failure: {0}")]
    DecodeFailure(String),
}

pub type LuxResult<T> = Result<T, LuxError>;
pub type TransportResult<T> = Result<T, TransportError>;
