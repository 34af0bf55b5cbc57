//! Lifecycle states and stack version descriptors shared across the topology.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a topology entity.
///
/// Used both as the desired state administrators set and as the actual state
/// observed on a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Newly declared, nothing installed yet
    Init,

    /// Installation in progress
    Installing,

    /// Installation failed
    InstallFailed,

    /// Installed but not running
    Installed,

    /// Startup in progress
    Starting,

    /// Running
    Started,

    /// Shutdown in progress
    Stopping,

    /// Uninstall in progress
    Uninstalling,

    /// Uninstalled
    Uninstalled,

    /// Rolling upgrade in progress
    Upgrading,

    /// Administratively paused; no changes are driven
    Maintenance,

    /// State could not be determined
    Unknown,
}

impl LifecycleState {
    /// Whether deletion is permitted from this state.
    pub fn is_removable(&self) -> bool {
        matches!(
            self,
            LifecycleState::Init
                | LifecycleState::Installing
                | LifecycleState::InstallFailed
                | LifecycleState::Installed
                | LifecycleState::Uninstalling
                | LifecycleState::Uninstalled
                | LifecycleState::Unknown
        )
    }

    /// Whether an entity in this state counts as installed for summaries.
    pub fn is_installed(&self) -> bool {
        *self == LifecycleState::Installed
    }

    /// Whether an entity in this state counts as running for summaries.
    pub fn is_started(&self) -> bool {
        *self == LifecycleState::Started
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Init => write!(f, "Init"),
            LifecycleState::Installing => write!(f, "Installing"),
            LifecycleState::InstallFailed => write!(f, "InstallFailed"),
            LifecycleState::Installed => write!(f, "Installed"),
            LifecycleState::Starting => write!(f, "Starting"),
            LifecycleState::Started => write!(f, "Started"),
            LifecycleState::Stopping => write!(f, "Stopping"),
            LifecycleState::Uninstalling => write!(f, "Uninstalling"),
            LifecycleState::Uninstalled => write!(f, "Uninstalled"),
            LifecycleState::Upgrading => write!(f, "Upgrading"),
            LifecycleState::Maintenance => write!(f, "Maintenance"),
            LifecycleState::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Stack distribution identity: a named software stack at a specific version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackVersion {
    name: String,
    version: String,
}

impl StackVersion {
    /// Create a stack version descriptor.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        StackVersion {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Stack name, e.g. `fleet`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stack version, e.g. `2.1.0`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Combined identifier, `NAME-VERSION`.
    pub fn id(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

impl fmt::Display for StackVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}
