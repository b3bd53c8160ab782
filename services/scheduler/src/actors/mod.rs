//! Actor framework for the scheduler service.
//!
//! The cluster manager delivers callbacks asynchronously and may do so from
//! several places at once. Routing every event through a single actor's
//! mailbox gives the scheduler exclusive access to its state without locks.
//!
//! ## Actor Types
//!
//! - `SchedulerActor`: Owns the offer scheduler and its driver

mod framework;
mod scheduler;

pub use framework::{spawn_actor, Actor, ActorContext, ActorError, ActorHandle, ActorRef, ActorState, Message};
pub use scheduler::{SchedulerActor, SchedulerMessage};
