//! # skiff-events
//!
//! Data exchanged with the cluster manager.
//!
//! ## Inbound
//!
//! The manager pushes [`SchedulerEvent`]s: registration notices, batches of
//! resource [`Offer`]s, [`TaskStatus`] updates and lifecycle notifications.
//! Delivery is asynchronous and may reorder, duplicate or drop events.
//!
//! ## Outbound
//!
//! Accepted offers are answered with a [`TaskInfo`] describing a Docker
//! container launch plus a refusal [`Filters`] hint.
//!
//! ## Wire Format
//!
//! [`EventEnvelope`] frames events as one JSON object per line for the
//! scheduler binary's stdin transport.

mod envelope;
mod error;
mod task;
mod types;

pub use envelope::*;
pub use error::{EventError, OfferError};
pub use task::*;
pub use types::*;
