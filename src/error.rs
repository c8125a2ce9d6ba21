//! Error types for convo-export
//!
//! This module provides the error handling for the library:
//! - A single structured [`Error`] enum for operation-level failures
//! - A [`RenderError`] for per-record render failures, which are absorbed
//!   into result counters and never abort a batch

use thiserror::Error;

/// Result type alias for convo-export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for convo-export
///
/// Only ingestion-level failures (`NotFound`, `MalformedPayload`, `Busy`) and
/// whole-call failures (`TargetUnavailable`, `Config`) abort an operation.
/// Per-record and per-file failures are counted, not raised.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency")
        key: Option<String>,
    },

    /// Record collection absent from an archive input
    #[error("record collection not found: {0}")]
    NotFound(String),

    /// Payload could not be decoded into an ordered sequence of records
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A conflicting top-level operation is already in flight
    #[error("busy: another export operation is already in flight")]
    Busy,

    /// Destination directory handle is stale or unreachable
    #[error("destination '{name}' is unavailable: {reason}")]
    TargetUnavailable {
        /// Display name of the destination that became unreachable
        name: String,
        /// Why the destination could not be used
        reason: String,
    },

    /// Archive bundling failed
    #[error("bundling error: {0}")]
    Bundle(String),

    /// Storage capability failure outside a per-file write (e.g., acquiring a directory)
    #[error("storage error: {0}")]
    Storage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Per-record render failure
///
/// Local to one record: the pipeline counts it and continues. The failed
/// record's identity is not marked processed, so a later run may retry it.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The record carried no renderable content
    #[error("record has no renderable content: {0}")]
    EmptyRecord(String),

    /// The record's structure did not match any supported shape
    #[error("malformed record: {0}")]
    Malformed(String),
}
