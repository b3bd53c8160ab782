//! # skiff-scheduler
//!
//! Offer-driven scheduler that keeps one Docker workload at its target task
//! count on a two-level cluster manager.
//!
//! The manager pushes resource offers; the scheduler answers each one,
//! launching a task when the offer satisfies the placement constraints and
//! the target is not yet met, and declining it otherwise. The first task to
//! reach a terminal state ends the session.
//!
//! ## Layout
//!
//! - [`config`]: workload settings and service configuration
//! - [`scheduler`]: the decision core ([`OfferScheduler`])
//! - [`state`]: pending/running tracking
//! - [`task`]: launch description construction
//! - [`driver`]: outbound calls to the manager
//! - [`actors`]: serialized event delivery
//! - [`transport`]: JSON-lines event input

pub mod actors;
pub mod config;
pub mod driver;
pub mod error;
pub mod scheduler;
pub mod state;
pub mod task;
pub mod transport;

pub use config::{SchedulerConfig, WorkloadSpec};
pub use driver::{DriverCall, JsonLinesDriver, RecordingDriver, SchedulerDriver};
pub use error::{ConfigError, DriverError};
pub use scheduler::{
    DeclineReason, OfferDecision, OfferRoundStats, OfferScheduler, SchedulerSnapshot,
    SchedulerStats, StatusOutcome, REFUSE_SECONDS,
};
pub use state::{Promotion, SchedulerState, TaskPhase};
