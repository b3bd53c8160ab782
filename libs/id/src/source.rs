//! Task ID sources.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::TaskId;

/// Generates a fresh task ID for each launch attempt.
///
/// Implementations must never return the same ID twice within a session.
pub trait TaskIdSource: Send + Sync {
    /// Returns the next task ID.
    fn next_id(&self) -> TaskId;
}

/// ULID-backed task IDs: `{prefix}_{ulid}`.
#[derive(Debug, Clone)]
pub struct UlidTaskIdSource {
    prefix: String,
}

impl UlidTaskIdSource {
    /// Create a source with the given prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for UlidTaskIdSource {
    fn default() -> Self {
        Self::new("task")
    }
}

impl TaskIdSource for UlidTaskIdSource {
    fn next_id(&self) -> TaskId {
        TaskId::new(format!("{}_{}", self.prefix, crate::Ulid::new()))
    }
}

/// Counter-backed task IDs: `{prefix}-{n}`, starting at 1.
#[derive(Debug)]
pub struct SequentialTaskIdSource {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialTaskIdSource {
    /// Create a source with the given prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Number of IDs handed out so far.
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

impl TaskIdSource for SequentialTaskIdSource {
    fn next_id(&self) -> TaskId {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        TaskId::new(format!("{}-{}", self.prefix, n))
    }
}
