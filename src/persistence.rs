//! Abstract durable store consumed by topology nodes.
//!
//! The store holds one record per component and one per (component, host)
//! pair, addressed by composite keys. Refresh is assumed to read its own
//! writes. This crate performs no retries; store failures propagate to the
//! caller unmodified.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::service::ClusterId;
use crate::state::{LifecycleState, StackVersion};

/// Errors surfaced by the durable store
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record under the given key
    #[error("Record not found: {0}")]
    MissingRecord(String),

    /// A stored column could not be encoded or decoded
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Backend-specific failure
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Composite key of a component record: (cluster, service, component).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentKey {
    /// Owning cluster
    pub cluster_id: ClusterId,
    /// Owning service name
    pub service: String,
    /// Component name
    pub component: String,
}

impl ComponentKey {
    /// Create a component key.
    pub fn new(cluster_id: ClusterId, service: impl Into<String>, component: impl Into<String>) -> Self {
        ComponentKey {
            cluster_id,
            service: service.into(),
            component: component.into(),
        }
    }

    /// Extend into a host key.
    pub fn host(&self, host: impl Into<String>) -> HostKey {
        HostKey {
            component: self.clone(),
            host: host.into(),
        }
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cluster={}, service={}, component={}",
            self.cluster_id, self.service, self.component
        )
    }
}

/// Composite key of a host record: a component key plus the host name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostKey {
    /// Key of the owning component
    pub component: ComponentKey,
    /// Host name
    pub host: String,
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, host={}", self.component, self.host)
    }
}

/// Stored fields of a component node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// Record key
    pub key: ComponentKey,
    /// Desired lifecycle state
    pub desired_state: LifecycleState,
    /// Desired stack version, encoded as a JSON column (see [`encode_stack`])
    pub desired_stack: String,
}

/// Stored fields of one host's instance of a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostRecord {
    /// Record key
    pub key: HostKey,
    /// Last observed actual state
    pub actual_state: LifecycleState,
    /// Desired lifecycle state for this host
    pub desired_state: LifecycleState,
    /// When the actual state last changed
    pub last_transition: DateTime<Utc>,
}

/// Encode a stack version for storage in a record column.
pub fn encode_stack(stack: &StackVersion) -> Result<String, StoreError> {
    serde_json::to_string(stack).map_err(|e| StoreError::Encoding(e.to_string()))
}

/// Decode a stack version column.
pub fn decode_stack(column: &str) -> Result<StackVersion, StoreError> {
    serde_json::from_str(column).map_err(|e| StoreError::Encoding(e.to_string()))
}

/// Abstract durable record store.
///
/// Keyed by (cluster id, service name, component name) and, for host
/// records, additionally by host name. `create` fails if the key already
/// exists; `merge` overwrites the stored fields with the supplied ones;
/// `refresh` reloads; `remove` deletes.
pub trait PersistenceGateway: Send + Sync {
    /// Write a new component record.
    fn create_component(&self, record: &ComponentRecord) -> Result<(), StoreError>;

    /// Update-merge an existing component record.
    fn merge_component(&self, record: &ComponentRecord) -> Result<(), StoreError>;

    /// Reload a component record.
    fn refresh_component(&self, key: &ComponentKey) -> Result<ComponentRecord, StoreError>;

    /// Remove a component record.
    fn remove_component(&self, key: &ComponentKey) -> Result<(), StoreError>;

    /// Write a new host record.
    fn create_host(&self, record: &HostRecord) -> Result<(), StoreError>;

    /// Update-merge an existing host record.
    fn merge_host(&self, record: &HostRecord) -> Result<(), StoreError>;

    /// Reload a host record.
    fn refresh_host(&self, key: &HostKey) -> Result<HostRecord, StoreError>;

    /// Remove a host record.
    fn remove_host(&self, key: &HostKey) -> Result<(), StoreError>;

    /// All host records owned by one component, used when a cluster is
    /// reloaded from the store.
    fn host_records(&self, key: &ComponentKey) -> Result<Vec<HostRecord>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_column_round_trip() {
        let stack = StackVersion::new("fleet", "2.1.0");
        let column = encode_stack(&stack).unwrap();
        assert_eq!(decode_stack(&column).unwrap(), stack);
    }

    #[test]
    fn corrupt_stack_column_is_an_encoding_error() {
        let err = decode_stack("not json").unwrap_err();
        assert!(matches!(err, StoreError::Encoding(_)));
    }

    #[test]
    fn keys_render_their_identity() {
        let key = ComponentKey::new(ClusterId::new(), "datastore", "datastore-node");
        let rendered = key.to_string();
        assert!(rendered.contains("service=datastore"));
        assert!(rendered.contains("component=datastore-node"));

        let host_key = key.host("web-01");
        assert!(host_key.to_string().ends_with("host=web-01"));
    }
}
