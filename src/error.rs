//! Error types for ferro-cds
//!
//! Two kinds of failure exist in this crate and only one of them is an
//! `Err`. Programming-contract and environment problems (an unreadable
//! cache store, a malformed FASTA header) surface as [`CdsError`].
//! Data-quality problems (a CDS that does not translate back to its
//! protein, a key the remote database has never heard of) are values:
//! they travel through the pipeline as skip reasons and never unwind it.

use thiserror::Error;

/// Main error type for ferro-cds operations
#[derive(Error, Debug)]
pub enum CdsError {
    /// Header could not be parsed as a FASTA record at all
    #[error("Unparsable FASTA header: {msg}")]
    Classification { msg: String },

    /// The persisted cache store could not be read or written.
    ///
    /// This is the one failure that is fatal to a whole run: without a
    /// working store the resume/idempotence guarantees are void.
    #[error("Cache store error: {0}")]
    CacheStore(#[from] rusqlite::Error),

    /// A cached payload could not be decoded
    #[error("Cache payload error for key {key}: {msg}")]
    CachePayload { key: String, msg: String },

    /// Internal invariant violation: a key the fetch stage was supposed
    /// to settle is still pending
    #[error("Key {key} is still pending after fetch stage")]
    UnresolvedKey { key: String },

    /// IO error (for file operations)
    #[error("IO error: {msg}")]
    Io { msg: String },

    /// JSON serialization error
    #[error("JSON error: {msg}")]
    Json { msg: String },
}

impl CdsError {
    /// Create a classification error
    pub fn classification(msg: impl Into<String>) -> Self {
        CdsError::Classification { msg: msg.into() }
    }
}

impl From<std::io::Error> for CdsError {
    fn from(err: std::io::Error) -> Self {
        CdsError::Io {
            msg: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CdsError {
    fn from(err: serde_json::Error) -> Self {
        CdsError::Json {
            msg: err.to_string(),
        }
    }
}
