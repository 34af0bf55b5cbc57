//! Upward seam between a component and its owning service.
//!
//! A component never owns its service or cluster; it reaches upward only for
//! identity, the shared cluster-scope lock, and the derived-view refresh
//! notification issued after first persistence.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ControlResult;
use crate::locking::LockCoordinator;
use crate::state::StackVersion;

/// Unique identifier for a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterId(pub Uuid);

impl ClusterId {
    /// Create a new random cluster ID
    pub fn new() -> Self {
        ClusterId(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for ClusterId {
    fn default() -> Self {
        Self::new()
    }
}

/// What a component needs from its owning service.
///
/// Implementations hand out identity and shared infrastructure, never
/// ownership of the component itself; routing ownership back down through
/// this trait would create a reference cycle.
pub trait ComponentOwner: Send + Sync {
    /// Identifier of the cluster this service belongs to.
    fn cluster_id(&self) -> ClusterId;

    /// Human-readable cluster name.
    fn cluster_name(&self) -> String;

    /// Service name.
    fn service_name(&self) -> String;

    /// Stack version newly declared components inherit as their desired
    /// version.
    fn desired_stack_version(&self) -> StackVersion;

    /// Cluster-scope lock shared by every node in the owning cluster.
    fn lock_coordinator(&self) -> Arc<LockCoordinator>;

    /// Recompute service-level derived summaries. Called once per component
    /// after its first successful persistence.
    fn refresh(&self) -> ControlResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_ids_are_unique() {
        let a = ClusterId::new();
        let b = ClusterId::new();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn cluster_id_displays_as_uuid() {
        let id = ClusterId::new();
        assert_eq!(id.to_string(), id.as_uuid().to_string());
    }
}
