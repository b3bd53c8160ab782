//! # skiff-id
//!
//! Identifier types and task ID generation for the skiff scheduler.
//!
//! ## Identifier Kinds
//!
//! - **Opaque IDs** (`TaskId`, `OfferId`, `AgentId`, `FrameworkId`, `ExecutorId`)
//!   are strings owned by the cluster manager or by the launch path. They are
//!   carried through unmodified and only checked for emptiness on parse.
//! - **Session IDs** (`SessionId`) are ULID-based, prefixed `sess_`, and
//!   generated locally to correlate one scheduling session in logs.
//!
//! ## Task ID Generation
//!
//! Every launch attempt takes a fresh [`TaskId`] from a [`TaskIdSource`].
//! Sources must never repeat an ID within a session:
//!
//! - [`UlidTaskIdSource`]: `{prefix}_{ulid}`, unique across processes
//! - [`SequentialTaskIdSource`]: `{prefix}-{n}`, deterministic for tests and replay

mod error;
mod macros;
mod source;
mod types;

pub use error::IdError;
pub use source::{SequentialTaskIdSource, TaskIdSource, UlidTaskIdSource};
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
