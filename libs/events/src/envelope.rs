//! Event envelope - line framing for events arriving over a byte stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EventError, SchedulerEvent};

/// A scheduler event plus delivery metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Sender-assigned sequence number, used only for log correlation.
    #[serde(default)]
    pub seq: u64,

    /// When the transport received the event.
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,

    pub event: SchedulerEvent,
}

impl EventEnvelope {
    /// Wrap an event stamped with the current time.
    pub fn new(seq: u64, event: SchedulerEvent) -> Self {
        Self {
            seq,
            received_at: Utc::now(),
            event,
        }
    }

    /// Decode one line of input.
    ///
    /// Accepts either a full envelope or a bare event object; a bare event
    /// gets `seq = fallback_seq`.
    pub fn decode_line(line: &str, fallback_seq: u64) -> Result<Self, EventError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(EventError::EmptyLine);
        }

        let value: serde_json::Value = serde_json::from_str(line)?;
        if value.get("event").is_some() {
            return Ok(serde_json::from_value(value)?);
        }

        let event: SchedulerEvent = serde_json::from_value(value)?;
        Ok(Self::new(fallback_seq, event))
    }

    /// Encode as a single JSON line (no trailing newline).
    pub fn encode_line(&self) -> Result<String, EventError> {
        Ok(serde_json::to_string(self)?)
    }
}
