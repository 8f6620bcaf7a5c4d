//! Document store error types.

use berth_id::DocumentLink;
use thiserror::Error;

/// Document store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No document under this link.
    #[error("document not found: {0}")]
    NotFound(DocumentLink),

    /// Compare-and-set lost against a concurrent writer.
    #[error("version conflict on {link}: expected {expected}, found {actual}")]
    VersionConflict {
        link: DocumentLink,
        expected: u64,
        actual: u64,
    },

    /// A document with this link was already created.
    #[error("document already exists: {0}")]
    AlreadyExists(DocumentLink),

    /// Patch body was not a JSON object, or targeted a non-object document.
    #[error("invalid patch for {link}: {reason}")]
    InvalidPatch { link: DocumentLink, reason: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
