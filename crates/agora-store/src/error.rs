//! Store error types.

use thiserror::Error;

/// Errors that can occur when reading or writing documents.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No document with this id.
    #[error("Document not found in {collection}: {id}")]
    NotFound { collection: &'static str, id: String },

    /// Insert collided with an existing document.
    #[error("Document already exists in {collection}: {id}")]
    AlreadyExists { collection: &'static str, id: String },

    /// Compare-and-swap lost against a concurrent writer.
    #[error("Version conflict in {collection} for {id}: expected v{expected}, found v{found}")]
    VersionConflict {
        collection: &'static str,
        id: String,
        expected: u64,
        found: u64,
    },

    /// Read-modify-write gave up after exhausting its retry budget.
    #[error("Retry budget exhausted updating {collection}/{id} after {attempts} attempts")]
    RetryExhausted {
        collection: &'static str,
        id: String,
        attempts: u32,
    },

    /// Document failed to (de)serialize.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The collection lock was poisoned by a panicking writer.
    #[error("Store lock poisoned for {0}")]
    Poisoned(&'static str),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
