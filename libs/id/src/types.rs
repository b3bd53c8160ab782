//! Typed ID definitions.
//!
//! Cluster-manager identifiers are opaque strings. The session ID is the only
//! locally generated ULID-based identifier.

use crate::{define_id, define_opaque_id};

// =============================================================================
// Cluster Manager
// =============================================================================

define_opaque_id!(FrameworkId);
define_opaque_id!(OfferId);
define_opaque_id!(AgentId);
define_opaque_id!(ExecutorId);

// =============================================================================
// Tasks
// =============================================================================

define_opaque_id!(TaskId);

// =============================================================================
// Sessions
// =============================================================================

define_id!(SessionId, "sess");

// =============================================================================
// Tests
// =============================================================================
