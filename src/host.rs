//! Host instance: one host's copy of a component.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::persistence::{ComponentKey, HostKey, HostRecord};
use crate::state::LifecycleState;

/// One host's instance of a component.
///
/// Owned exclusively by its entry in the parent component's host map; the
/// map key always equals [`HostInstance::host_name`]. All mutation flows
/// through the owning [`crate::ComponentNode`] under its two-tier locks, so
/// the instance itself carries no lock. Values handed out by the component's
/// read accessors are snapshot copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostInstance {
    host_name: String,
    actual_state: LifecycleState,
    desired_state: LifecycleState,
    last_transition: DateTime<Utc>,
    durable: bool,
}

impl HostInstance {
    /// Create a transient instance for a newly added host.
    pub fn new(host_name: impl Into<String>) -> Self {
        HostInstance {
            host_name: host_name.into(),
            actual_state: LifecycleState::Init,
            desired_state: LifecycleState::Init,
            last_transition: Utc::now(),
            durable: false,
        }
    }

    /// Rebuild a durable instance from its stored record.
    pub fn from_record(record: &HostRecord) -> Self {
        HostInstance {
            host_name: record.key.host.clone(),
            actual_state: record.actual_state,
            desired_state: record.desired_state,
            last_transition: record.last_transition,
            durable: true,
        }
    }

    /// Host name; always equal to this instance's key in the parent map.
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Last observed actual state.
    pub fn actual_state(&self) -> LifecycleState {
        self.actual_state
    }

    /// Desired lifecycle state for this host.
    pub fn desired_state(&self) -> LifecycleState {
        self.desired_state
    }

    /// When the actual state last changed.
    pub fn last_transition(&self) -> DateTime<Utc> {
        self.last_transition
    }

    /// Whether this instance has a record in the durable store.
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    pub(crate) fn mark_durable(&mut self) {
        self.durable = true;
    }

    pub(crate) fn set_actual_state(&mut self, state: LifecycleState) {
        if state != self.actual_state {
            debug!(
                "Host state transition, host={}, oldState={}, newState={}",
                self.host_name, self.actual_state, state
            );
            self.actual_state = state;
            self.last_transition = Utc::now();
        }
    }

    pub(crate) fn set_desired_state(&mut self, state: LifecycleState) {
        self.desired_state = state;
    }

    /// Whether deletion of this instance is permitted.
    pub fn can_be_removed(&self) -> bool {
        self.desired_state.is_removable() && self.actual_state.is_removable()
    }

    /// Build the stored record for this instance under `component`.
    pub fn to_record(&self, component: &ComponentKey) -> HostRecord {
        HostRecord {
            key: component.host(self.host_name.clone()),
            actual_state: self.actual_state,
            desired_state: self.desired_state,
            last_transition: self.last_transition,
        }
    }

    /// Key of this instance's record under `component`.
    pub fn record_key(&self, component: &ComponentKey) -> HostKey {
        component.host(self.host_name.clone())
    }

    /// Append a human-readable rendering to `out`.
    pub fn debug_dump(&self, out: &mut String) {
        let _ = write!(
            out,
            "HostInstance={{ host={}, actualState={}, desiredState={}, durable={} }}",
            self.host_name, self.actual_state, self.desired_state, self.durable
        );
    }
}
