//! Error types for ID and link parsing.

use thiserror::Error;

/// Errors that can occur when parsing IDs or document links.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty.
    #[error("ID cannot be empty")]
    Empty,

    /// The ID has an invalid prefix.
    #[error("invalid ID prefix: expected '{expected}', got '{actual}'")]
    InvalidPrefix {
        expected: &'static str,
        actual: String,
    },

    /// The ID is missing the underscore separator.
    #[error("ID missing underscore separator")]
    MissingSeparator,

    /// The ULID portion of the ID is invalid.
    #[error("invalid ULID: {0}")]
    InvalidUlid(String),

    /// The link is not of the form `/{collection}/{id}`.
    #[error("invalid document link '{0}'")]
    InvalidLink(String),

    /// The link points into a different collection than the ID type expects.
    #[error("link '{link}' is not in collection '{expected}'")]
    WrongCollection {
        expected: &'static str,
        link: String,
    },
}

impl IdError {
    /// Returns true if this error is about the link shape rather than the ID.
    pub fn is_link_error(&self) -> bool {
        matches!(
            self,
            IdError::InvalidLink(_) | IdError::WrongCollection { .. }
        )
    }
}
