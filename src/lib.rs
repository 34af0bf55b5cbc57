//! Cluster topology control plane core.
//!
//! Tracks the desired and actual state of a hierarchical service topology
//! (cluster → service → component → host instance) and computes safe
//! execution plans for cluster-wide rolling changes. The two pillars are
//! [`ComponentNode`], the concurrency-safe middle tier that owns per-host
//! instances and mediates durability, and [`group_hosts`], the deterministic
//! partitioning of a fleet into rollout batches.
//!
//! The request layer, the concrete durable store, and the upgrade
//! orchestrator that consumes batch plans are external collaborators behind
//! the [`PersistenceGateway`], [`StackMetadataLookup`], and
//! [`ComponentOwner`] seams.

#![deny(rust_2018_idioms, nonstandard_style, future_incompatible)]
#![warn(missing_docs)]

pub mod batch;
pub mod component;
pub mod error;
pub mod host;
pub mod locking;
pub mod metadata;
pub mod persistence;
pub mod service;
pub mod state;

#[doc(hidden)]
pub mod testing;

pub use batch::{group_hosts, BatchStrategy};
pub use component::{ComponentNode, ComponentStatus};
pub use error::{ControlError, ControlResult};
pub use host::HostInstance;
pub use locking::{ClusterReadGuard, ClusterWriteGuard, LockCoordinator};
pub use metadata::{ComponentProfile, StackMetadataLookup};
pub use persistence::{
    ComponentKey, ComponentRecord, HostKey, HostRecord, PersistenceGateway, StoreError,
};
pub use service::{ClusterId, ComponentOwner};
pub use state::{LifecycleState, StackVersion};
