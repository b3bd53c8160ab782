//! Error types for event handling.

use thiserror::Error;

/// Errors that can occur when decoding events from the wire.
#[derive(Debug, Error, Clone)]
pub enum EventError {
    /// The line was empty.
    #[error("empty event line")]
    EmptyLine,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::Serialization(err.to_string())
    }
}

/// Reasons an individual offer cannot be used.
///
/// These are never fatal: the offer is declined and the batch continues.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OfferError {
    /// The offer carries no offer ID.
    #[error("offer has no id")]
    MissingOfferId,

    /// The offer's wire form did not decode.
    #[error("offer {offer_id} could not be decoded: {message}")]
    Undecodable { offer_id: String, message: String },

    /// The offer carries no agent ID, so a task cannot be placed on it.
    #[error("offer {offer_id} has no agent id")]
    MissingAgentId { offer_id: String },
}
