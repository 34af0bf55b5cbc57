//! Stack metadata lookup: the classification oracle consumed at node
//! construction.

use serde::{Deserialize, Serialize};

use crate::error::ControlResult;
use crate::state::StackVersion;

/// Classification flags a stack definition assigns to one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentProfile {
    /// Component is a client-side library/tool rather than a daemon
    pub is_client: bool,
    /// Component is the coordinating master of its service
    pub is_master: bool,
}

/// Oracle resolving a (stack, service, component) tuple to its profile.
///
/// Implementations fail with [`crate::ControlError::NotFound`] when the tuple
/// is not part of the stack definition. Node construction maps that miss to
/// [`crate::ControlError::Configuration`]; the lookup happens once and the
/// flags are cached as plain fields afterwards.
pub trait StackMetadataLookup: Send + Sync {
    /// Resolve the profile of `component` within `service` on `stack`.
    fn lookup_component(
        &self,
        stack: &StackVersion,
        service: &str,
        component: &str,
    ) -> ControlResult<ComponentProfile>;
}
