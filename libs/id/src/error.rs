//! Identifier parsing errors.

use thiserror::Error;

/// Why a string could not be turned into an identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// Blank input.
    #[error("identifier is blank")]
    Empty,

    /// Prefixed ID with the wrong prefix.
    #[error("expected '{expected}_' prefix, found '{actual}'")]
    InvalidPrefix {
        expected: &'static str,
        actual: String,
    },

    /// Prefixed ID with no `_` between prefix and ULID.
    #[error("identifier has no '_' between prefix and ULID")]
    MissingSeparator,

    /// Prefixed ID whose ULID part does not decode.
    #[error("malformed ULID: {0}")]
    InvalidUlid(String),
}

impl IdError {
    /// Returns true for blank input.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty)
    }
}
