//! JSON-lines event transport.
//!
//! Reads [`EventEnvelope`]s (or bare events) one per line and forwards them
//! to the scheduler actor. Lines that fail to decode are logged and skipped.

use skiff_events::EventEnvelope;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info, warn};

use crate::actors::{ActorHandle, SchedulerMessage};

/// Counts for one pump run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Non-blank lines read.
    pub lines: u64,
    /// Events handed to the actor.
    pub delivered: u64,
    /// Lines that failed to decode.
    pub rejected: u64,
}

/// Forward events from `reader` until EOF or until the actor stops.
pub async fn pump_lines<R>(reader: R, handle: &ActorHandle<SchedulerMessage>) -> std::io::Result<PumpStats>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut stats = PumpStats::default();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        stats.lines += 1;

        let envelope = match EventEnvelope::decode_line(&line, stats.lines) {
            Ok(envelope) => envelope,
            Err(e) => {
                stats.rejected += 1;
                warn!(line_number = stats.lines, error = %e, "Skipping undecodable event line");
                continue;
            }
        };

        debug!(seq = envelope.seq, kind = envelope.event.kind(), "Received event");

        if handle.send(SchedulerMessage::Event(envelope)).await.is_err() {
            info!("Scheduler actor stopped, no longer reading events");
            break;
        }
        stats.delivered += 1;
    }

    Ok(stats)
}
