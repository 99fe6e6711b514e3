//! Error types that terminate an invocation
//!
//! Only two conditions ever propagate to the caller of a trigger:
//! a wire-shape violation in the report codec and an unusable response from
//! the text generator. Everything else (unreachable data source, skipped
//! verdict, failed ledger write, failed webhook) degrades to a fallback value
//! or a no-op inside its component and shows up only in logs.

use thiserror::Error;

/// Errors that abort the current invocation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    /// Encoded report or ledger event does not match the declared layout
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Text generator returned no usable attestation text
    #[error("Malformed response from text generator: {0}")]
    MalformedResponse(String),
}

impl GuardError {
    pub fn schema(reason: impl Into<String>) -> Self {
        GuardError::SchemaMismatch(reason.into())
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        GuardError::MalformedResponse(reason.into())
    }
}

/// Result type for pipeline operations
pub type GuardResult<T> = Result<T, GuardError>;
