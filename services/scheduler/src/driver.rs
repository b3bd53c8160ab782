//! Driver interface to the cluster manager, plus implementations.
//!
//! The driver is the scheduler's only outbound channel. Calls are
//! fire-and-forget: a failed call is logged by the scheduler and never
//! retried.
//!
//! - [`JsonLinesDriver`]: writes each call as a JSON line (used by the binary)
//! - [`RecordingDriver`]: keeps calls in memory for inspection

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use skiff_events::{Filters, TaskInfo};
use skiff_id::OfferId;

use crate::error::DriverError;

/// Outbound calls to the cluster manager.
pub trait SchedulerDriver: Send + Sync {
    /// Answer an offer. An empty task list declines it.
    fn launch_tasks(
        &self,
        offer_id: &OfferId,
        tasks: Vec<TaskInfo>,
        filters: Filters,
    ) -> Result<(), DriverError>;

    /// Decline an offer.
    fn decline_offer(&self, offer_id: &OfferId, filters: Filters) -> Result<(), DriverError> {
        self.launch_tasks(offer_id, Vec::new(), filters)
    }

    /// Ask the driver to end the scheduling session.
    fn request_shutdown(&self, forceful: bool) -> Result<(), DriverError>;
}

impl<D: SchedulerDriver + ?Sized> SchedulerDriver for Arc<D> {
    fn launch_tasks(
        &self,
        offer_id: &OfferId,
        tasks: Vec<TaskInfo>,
        filters: Filters,
    ) -> Result<(), DriverError> {
        (**self).launch_tasks(offer_id, tasks, filters)
    }

    fn request_shutdown(&self, forceful: bool) -> Result<(), DriverError> {
        (**self).request_shutdown(forceful)
    }
}

/// A single driver call, as recorded or written to the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum DriverCall {
    LaunchTasks {
        offer_id: OfferId,
        tasks: Vec<TaskInfo>,
        filters: Filters,
    },
    Shutdown {
        forceful: bool,
    },
}

impl DriverCall {
    /// Returns true for an offer response with no tasks.
    pub fn is_decline(&self) -> bool {
        matches!(self, DriverCall::LaunchTasks { tasks, .. } if tasks.is_empty())
    }

    /// Returns true for an offer response with at least one task.
    pub fn is_launch(&self) -> bool {
        matches!(self, DriverCall::LaunchTasks { tasks, .. } if !tasks.is_empty())
    }

    /// The offer this call answers, if any.
    pub fn offer_id(&self) -> Option<&OfferId> {
        match self {
            DriverCall::LaunchTasks { offer_id, .. } => Some(offer_id),
            DriverCall::Shutdown { .. } => None,
        }
    }
}

// =============================================================================
// JSON Lines Driver
// =============================================================================

/// Writes every call as one JSON object per line.
pub struct JsonLinesDriver<W: Write + Send> {
    out: Mutex<W>,
}

impl JsonLinesDriver<std::io::Stdout> {
    /// Driver writing to stdout.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesDriver<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Consume the driver and return the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_call(&self, call: &DriverCall) -> Result<(), DriverError> {
        let line = serde_json::to_string(call)?;
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> SchedulerDriver for JsonLinesDriver<W> {
    fn launch_tasks(
        &self,
        offer_id: &OfferId,
        tasks: Vec<TaskInfo>,
        filters: Filters,
    ) -> Result<(), DriverError> {
        self.write_call(&DriverCall::LaunchTasks {
            offer_id: offer_id.clone(),
            tasks,
            filters,
        })
    }

    fn request_shutdown(&self, forceful: bool) -> Result<(), DriverError> {
        self.write_call(&DriverCall::Shutdown { forceful })
    }
}

// =============================================================================
// Recording Driver
// =============================================================================

/// In-memory driver that records every call.
#[derive(Debug, Default)]
pub struct RecordingDriver {
    calls: Mutex<Vec<DriverCall>>,
    reject_calls: bool,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A driver that records calls but reports every one as rejected.
    pub fn rejecting() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            reject_calls: true,
        }
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.lock().clone()
    }

    /// Offer responses carrying tasks.
    pub fn launches(&self) -> Vec<DriverCall> {
        self.lock().iter().filter(|c| c.is_launch()).cloned().collect()
    }

    /// Number of offer responses with no tasks.
    pub fn decline_count(&self) -> usize {
        self.lock().iter().filter(|c| c.is_decline()).count()
    }

    /// Number of offer responses of either kind.
    pub fn response_count(&self) -> usize {
        self.lock().iter().filter(|c| c.offer_id().is_some()).count()
    }

    /// Number of shutdown requests.
    pub fn shutdown_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|c| matches!(c, DriverCall::Shutdown { .. }))
            .count()
    }

    /// Forget recorded calls.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DriverCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: DriverCall) -> Result<(), DriverError> {
        self.lock().push(call);
        if self.reject_calls {
            return Err(DriverError::Rejected("recording driver set to reject".to_string()));
        }
        Ok(())
    }
}

impl SchedulerDriver for RecordingDriver {
    fn launch_tasks(
        &self,
        offer_id: &OfferId,
        tasks: Vec<TaskInfo>,
        filters: Filters,
    ) -> Result<(), DriverError> {
        self.record(DriverCall::LaunchTasks {
            offer_id: offer_id.clone(),
            tasks,
            filters,
        })
    }

    fn request_shutdown(&self, forceful: bool) -> Result<(), DriverError> {
        self.record(DriverCall::Shutdown { forceful })
    }
}
