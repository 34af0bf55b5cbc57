//! Component node: the middle tier of the topology.
//!
//! A [`ComponentNode`] owns the per-host instances of one component, holds
//! the desired lifecycle state and stack version, mediates persistence, and
//! enforces removal safety. Every operation follows the two-tier lock
//! discipline described in [`crate::locking`].

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};
use crate::host::HostInstance;
use crate::locking::LockCoordinator;
use crate::metadata::{ComponentProfile, StackMetadataLookup};
use crate::persistence::{
    decode_stack, encode_stack, ComponentKey, ComponentRecord, PersistenceGateway, StoreError,
};
use crate::service::{ClusterId, ComponentOwner};
use crate::state::{LifecycleState, StackVersion};

/// Fields guarded by the node-scope lock.
struct ComponentInner {
    desired_state: LifecycleState,
    desired_stack: StackVersion,
    hosts: HashMap<String, HostInstance>,
}

/// One component of a service: a named set of host instances plus the
/// desired state administrators want them to reach.
///
/// Created transiently when a component is declared for a service, or
/// rebuilt from the store when a cluster is loaded. Classification flags are
/// resolved against stack metadata exactly once, at construction.
pub struct ComponentNode {
    name: String,
    owner: Arc<dyn ComponentOwner>,
    locks: Arc<LockCoordinator>,
    store: Arc<dyn PersistenceGateway>,
    is_client: bool,
    is_master: bool,
    // Only ever false while the node is new; checked before deciding whether
    // first-time persistence needs the cluster-scope write lock.
    durable: AtomicBool,
    inner: RwLock<ComponentInner>,
}

impl std::fmt::Debug for ComponentNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentNode")
            .field("name", &self.name)
            .field("is_client", &self.is_client)
            .field("is_master", &self.is_master)
            .field("durable", &self.durable.load(Ordering::Relaxed))
            .finish()
    }
}

impl ComponentNode {
    /// Declare a new, transient component for a service.
    ///
    /// Fails with [`ControlError::Configuration`] if the stack metadata does
    /// not recognize the (stack, service, component) tuple; no node is
    /// created in that case.
    pub fn new(
        owner: Arc<dyn ComponentOwner>,
        name: impl Into<String>,
        metadata: &dyn StackMetadataLookup,
        store: Arc<dyn PersistenceGateway>,
    ) -> ControlResult<Self> {
        let name = name.into();
        let stack = owner.desired_stack_version();
        let profile = Self::classify(owner.as_ref(), &name, &stack, metadata)?;
        let locks = owner.lock_coordinator();
        Ok(ComponentNode {
            name,
            owner,
            locks,
            store,
            is_client: profile.is_client,
            is_master: profile.is_master,
            durable: AtomicBool::new(false),
            inner: RwLock::new(ComponentInner {
                desired_state: LifecycleState::Init,
                desired_stack: stack,
                hosts: HashMap::new(),
            }),
        })
    }

    /// Rebuild a durable component from its stored record, reconstructing
    /// every owned host instance from the store.
    pub fn from_record(
        owner: Arc<dyn ComponentOwner>,
        record: ComponentRecord,
        metadata: &dyn StackMetadataLookup,
        store: Arc<dyn PersistenceGateway>,
    ) -> ControlResult<Self> {
        let name = record.key.component.clone();
        let profile = Self::classify(
            owner.as_ref(),
            &name,
            &owner.desired_stack_version(),
            metadata,
        )?;
        let desired_stack = decode_stack(&record.desired_stack)?;

        let mut hosts = HashMap::new();
        for host_record in store.host_records(&record.key)? {
            let instance = HostInstance::from_record(&host_record);
            hosts.insert(instance.host_name().to_string(), instance);
        }

        let locks = owner.lock_coordinator();
        Ok(ComponentNode {
            name,
            owner,
            locks,
            store,
            is_client: profile.is_client,
            is_master: profile.is_master,
            durable: AtomicBool::new(true),
            inner: RwLock::new(ComponentInner {
                desired_state: record.desired_state,
                desired_stack,
                hosts,
            }),
        })
    }

    fn classify(
        owner: &dyn ComponentOwner,
        name: &str,
        stack: &StackVersion,
        metadata: &dyn StackMetadataLookup,
    ) -> ControlResult<ComponentProfile> {
        metadata
            .lookup_component(stack, &owner.service_name(), name)
            .map_err(|err| match err {
                ControlError::NotFound(_) => ControlError::Configuration(format!(
                    "component not recognized in stack metadata, cluster={}, service={}, \
                     component={}, stack={}",
                    owner.cluster_name(),
                    owner.service_name(),
                    name,
                    stack
                )),
                other => other,
            })
    }

    /// Component name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier of the owning cluster.
    pub fn cluster_id(&self) -> ClusterId {
        self.owner.cluster_id()
    }

    /// Name of the owning cluster.
    pub fn cluster_name(&self) -> String {
        self.owner.cluster_name()
    }

    /// Name of the owning service.
    pub fn service_name(&self) -> String {
        self.owner.service_name()
    }

    /// Whether stack metadata classifies this component as a client.
    pub fn is_client(&self) -> bool {
        self.is_client
    }

    /// Whether stack metadata classifies this component as a master.
    pub fn is_master(&self) -> bool {
        self.is_master
    }

    /// Whether this node has a record in the durable store.
    pub fn is_durable(&self) -> bool {
        self.durable.load(Ordering::SeqCst)
    }

    /// Composite store key of this component.
    pub fn key(&self) -> ComponentKey {
        ComponentKey::new(self.owner.cluster_id(), self.owner.service_name(), self.name.clone())
    }

    /// Snapshot copy of the host map. Stable under concurrent mutation: a
    /// reader sees either the pre- or post-change map, never a partial one.
    pub fn list_hosts(&self) -> HashMap<String, HostInstance> {
        let _cluster = self.locks.cluster_read();
        let inner = self.inner.read();
        inner.hosts.clone()
    }

    /// Host names in lexicographic order: the canonical snapshot to hand to
    /// the batch planner, so repeated planning over the same fleet is
    /// reproducible.
    pub fn host_names(&self) -> Vec<String> {
        let _cluster = self.locks.cluster_read();
        let inner = self.inner.read();
        let mut names: Vec<String> = inner.hosts.keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of one host instance.
    ///
    /// Fails with [`ControlError::NotFound`] if the host is absent.
    pub fn get_host(&self, host_name: &str) -> ControlResult<HostInstance> {
        let _cluster = self.locks.cluster_read();
        let inner = self.inner.read();
        inner
            .hosts
            .get(host_name)
            .cloned()
            .ok_or_else(|| self.host_not_found(host_name))
    }

    /// Declare this component on a new host.
    ///
    /// Fails with [`ControlError::DuplicateEntity`] if an instance for the
    /// host already exists; the map is unchanged on failure.
    pub fn add_host(&self, host_name: &str) -> ControlResult<HostInstance> {
        let instance = HostInstance::new(host_name);
        self.add_host_instance(instance.clone())?;
        Ok(instance)
    }

    /// Insert a prebuilt host instance.
    pub fn add_host_instance(&self, instance: HostInstance) -> ControlResult<()> {
        let _cluster = self.locks.cluster_write();
        let mut inner = self.inner.write();
        self.insert_host_locked(&mut inner, instance)
    }

    /// Insert a batch of host instances keyed by host name.
    ///
    /// Fails with [`ControlError::InvalidArgument`] if any key differs from
    /// its instance's host name and with [`ControlError::DuplicateEntity`]
    /// if any host is already present; nothing is inserted on any failure.
    pub fn add_hosts(&self, instances: HashMap<String, HostInstance>) -> ControlResult<()> {
        let _cluster = self.locks.cluster_write();
        let mut inner = self.inner.write();

        for (key, instance) in &instances {
            if key != instance.host_name() {
                return Err(ControlError::InvalidArgument(format!(
                    "host map key does not match instance host name, {}, key={}, host={}",
                    self.key(),
                    key,
                    instance.host_name()
                )));
            }
            if inner.hosts.contains_key(key) {
                return Err(self.duplicate_host(key));
            }
        }

        for (_, instance) in instances {
            self.insert_host_locked(&mut inner, instance)?;
        }
        Ok(())
    }

    fn insert_host_locked(
        &self,
        inner: &mut ComponentInner,
        instance: HostInstance,
    ) -> ControlResult<()> {
        if inner.hosts.contains_key(instance.host_name()) {
            return Err(self.duplicate_host(instance.host_name()));
        }
        debug!("Adding host instance, {}, host={}", self.key(), instance.host_name());
        inner.hosts.insert(instance.host_name().to_string(), instance);
        Ok(())
    }

    fn duplicate_host(&self, host: &str) -> ControlError {
        ControlError::DuplicateEntity(format!(
            "cannot add duplicate host instance, {}, host={}",
            self.key(),
            host
        ))
    }

    fn host_not_found(&self, host: &str) -> ControlError {
        ControlError::NotFound(format!("{}, host={}", self.key(), host))
    }

    /// Desired lifecycle state of this component.
    pub fn desired_state(&self) -> LifecycleState {
        let _cluster = self.locks.cluster_read();
        self.inner.read().desired_state
    }

    /// Set the desired lifecycle state. Issues one merge write if the node
    /// is durable; a transient node is updated in memory only. On a store
    /// failure the in-memory state is unchanged.
    pub fn set_desired_state(&self, state: LifecycleState) -> ControlResult<()> {
        let _cluster = self.locks.cluster_read();
        let mut inner = self.inner.write();
        debug!(
            "Setting desired state, {}, oldDesiredState={}, newDesiredState={}",
            self.key(),
            inner.desired_state,
            state
        );
        if self.is_durable() {
            self.store.merge_component(&ComponentRecord {
                key: self.key(),
                desired_state: state,
                desired_stack: encode_stack(&inner.desired_stack)?,
            })?;
        }
        inner.desired_state = state;
        Ok(())
    }

    /// Desired stack version of this component.
    pub fn desired_stack_version(&self) -> StackVersion {
        let _cluster = self.locks.cluster_read();
        self.inner.read().desired_stack.clone()
    }

    /// Set the desired stack version. Same persistence contract as
    /// [`ComponentNode::set_desired_state`].
    pub fn set_desired_stack_version(&self, stack: StackVersion) -> ControlResult<()> {
        let _cluster = self.locks.cluster_read();
        let mut inner = self.inner.write();
        debug!(
            "Setting desired stack version, {}, oldDesiredStackVersion={}, \
             newDesiredStackVersion={}",
            self.key(),
            inner.desired_stack,
            stack
        );
        if self.is_durable() {
            self.store.merge_component(&ComponentRecord {
                key: self.key(),
                desired_state: inner.desired_state,
                desired_stack: encode_stack(&stack)?,
            })?;
        }
        inner.desired_stack = stack;
        Ok(())
    }

    /// Whether this component may be deleted: its own desired state must be
    /// removable and every owned host instance must report removable.
    pub fn can_be_removed(&self) -> bool {
        let _cluster = self.locks.cluster_read();
        let inner = self.inner.read();
        if !inner.desired_state.is_removable() {
            return false;
        }
        for host in inner.hosts.values() {
            if !host.can_be_removed() {
                warn!(
                    "Found non-removable host instance while checking component removability, \
                     {}, host={}",
                    self.key(),
                    host.host_name()
                );
                return false;
            }
        }
        true
    }

    /// Persist this component. Idempotent.
    ///
    /// The first call creates the durable record, marks the node durable,
    /// reloads fields from the store to pick up store-assigned values, and
    /// notifies the owner so service-level summaries stay consistent. Later
    /// calls are a plain update-merge of the in-memory fields.
    ///
    /// A crash between the durable create and the reload/notify steps can
    /// leave a record no in-memory node reflects yet; recovery is the
    /// caller's cluster reload path.
    pub fn persist(&self) -> ControlResult<()> {
        let mut cluster_guard = if !self.is_durable() {
            Some(self.locks.cluster_write())
        } else {
            None
        };

        let mut inner = self.inner.write();
        if !self.is_durable() {
            // The new record joins the cluster's shared indexes; once it is
            // written the coarse lock has no further bearing on the rest of
            // this sequence. The node-scope write lock stays held so no
            // reader can observe the node durable with stale fields.
            self.store.create_component(&self.record_locked(&inner)?)?;
            drop(cluster_guard.take());

            self.durable.store(true, Ordering::SeqCst);
            info!("Component persisted, {}", self.key());
            self.reload_locked(&mut inner)?;
            self.owner.refresh()?;
        } else {
            self.store.merge_component(&self.record_locked(&inner)?)?;
        }
        Ok(())
    }

    /// Reload fields from the store, absorbing externally driven changes.
    /// A no-op on a transient node.
    pub fn refresh(&self) -> ControlResult<()> {
        if !self.is_durable() {
            return Ok(());
        }
        let _cluster = self.locks.cluster_read();
        let mut inner = self.inner.write();
        self.reload_locked(&mut inner)
    }

    fn record_locked(&self, inner: &ComponentInner) -> Result<ComponentRecord, StoreError> {
        Ok(ComponentRecord {
            key: self.key(),
            desired_state: inner.desired_state,
            desired_stack: encode_stack(&inner.desired_stack)?,
        })
    }

    fn reload_locked(&self, inner: &mut ComponentInner) -> ControlResult<()> {
        let record = self.store.refresh_component(&self.key())?;
        inner.desired_state = record.desired_state;
        inner.desired_stack = decode_stack(&record.desired_stack)?;
        Ok(())
    }

    /// Remove every owned host instance.
    ///
    /// Fails with [`ControlError::Precondition`] before touching anything if
    /// any instance reports non-removable.
    pub fn delete_all_hosts(&self) -> ControlResult<()> {
        let _cluster = self.locks.cluster_write();
        let mut inner = self.inner.write();
        self.delete_all_hosts_locked(&mut inner)
    }

    fn delete_all_hosts_locked(&self, inner: &mut ComponentInner) -> ControlResult<()> {
        for host in inner.hosts.values() {
            if !host.can_be_removed() {
                return Err(ControlError::Precondition(format!(
                    "found non-removable host instance while deleting all hosts, {}, host={}, \
                     state={}",
                    self.key(),
                    host.host_name(),
                    host.actual_state()
                )));
            }
        }

        info!("Deleting all host instances, {}, count={}", self.key(), inner.hosts.len());
        let key = self.key();
        for host in inner.hosts.values() {
            if host.is_durable() {
                self.store.remove_host(&host.record_key(&key))?;
            }
        }
        inner.hosts.clear();
        Ok(())
    }

    /// Remove one host instance.
    ///
    /// Fails with [`ControlError::NotFound`] if absent and with
    /// [`ControlError::Precondition`] if the instance is non-removable.
    pub fn delete_host(&self, host_name: &str) -> ControlResult<()> {
        let _cluster = self.locks.cluster_write();
        let mut inner = self.inner.write();

        let host = inner
            .hosts
            .get(host_name)
            .ok_or_else(|| self.host_not_found(host_name))?;
        if !host.can_be_removed() {
            return Err(ControlError::Precondition(format!(
                "cannot delete host instance, {}, host={}, state={}",
                self.key(),
                host.host_name(),
                host.actual_state()
            )));
        }
        if host.is_durable() {
            self.store.remove_host(&host.record_key(&self.key()))?;
        }

        info!("Deleting host instance, {}, host={}", self.key(), host_name);
        inner.hosts.remove(host_name);
        Ok(())
    }

    /// Delete this component: every owned host instance, then the durable
    /// record. Any failure in the host-removal step aborts before the
    /// record is touched; durability reverts only on success.
    pub fn delete(&self) -> ControlResult<()> {
        let _cluster = self.locks.cluster_write();
        let mut inner = self.inner.write();

        self.delete_all_hosts_locked(&mut inner)?;

        if self.is_durable() {
            self.store.remove_component(&self.key())?;
            self.durable.store(false, Ordering::SeqCst);
            info!("Component record removed, {}", self.key());
        }
        Ok(())
    }

    /// Record a host's observed actual state. Issues one host merge write
    /// if that instance is durable; on a store failure the instance is
    /// unchanged.
    pub fn set_host_actual_state(
        &self,
        host_name: &str,
        state: LifecycleState,
    ) -> ControlResult<()> {
        let _cluster = self.locks.cluster_read();
        let mut inner = self.inner.write();
        let key = self.key();
        let host = inner
            .hosts
            .get_mut(host_name)
            .ok_or_else(|| self.host_not_found(host_name))?;

        let mut updated = host.clone();
        updated.set_actual_state(state);
        if updated.is_durable() {
            self.store.merge_host(&updated.to_record(&key))?;
        }
        *host = updated;
        Ok(())
    }

    /// Set a host's desired state. Same persistence contract as
    /// [`ComponentNode::set_host_actual_state`].
    pub fn set_host_desired_state(
        &self,
        host_name: &str,
        state: LifecycleState,
    ) -> ControlResult<()> {
        let _cluster = self.locks.cluster_read();
        let mut inner = self.inner.write();
        let key = self.key();
        let host = inner
            .hosts
            .get_mut(host_name)
            .ok_or_else(|| self.host_not_found(host_name))?;

        let mut updated = host.clone();
        updated.set_desired_state(state);
        if updated.is_durable() {
            self.store.merge_host(&updated.to_record(&key))?;
        }
        *host = updated;
        Ok(())
    }

    /// Persist one host instance: first call creates its record and marks
    /// it durable, later calls merge.
    pub fn persist_host(&self, host_name: &str) -> ControlResult<()> {
        let _cluster = self.locks.cluster_write();
        let mut inner = self.inner.write();
        let key = self.key();
        let host = inner
            .hosts
            .get_mut(host_name)
            .ok_or_else(|| self.host_not_found(host_name))?;
        if !host.is_durable() {
            self.store.create_host(&host.to_record(&key))?;
            host.mark_durable();
            debug!("Host instance persisted, {}, host={}", key, host_name);
        } else {
            self.store.merge_host(&host.to_record(&key))?;
        }
        Ok(())
    }

    /// Count of owned host instances grouped by actual state. Pure snapshot,
    /// no side effects.
    pub fn host_state_counts(&self) -> HashMap<LifecycleState, usize> {
        let _cluster = self.locks.cluster_read();
        let inner = self.inner.read();
        let mut counts = HashMap::new();
        for host in inner.hosts.values() {
            *counts.entry(host.actual_state()).or_insert(0) += 1;
        }
        counts
    }

    /// Number of owned host instances.
    pub fn total_count(&self) -> usize {
        let _cluster = self.locks.cluster_read();
        self.inner.read().hosts.len()
    }

    /// Number of instances currently running.
    pub fn started_count(&self) -> usize {
        let _cluster = self.locks.cluster_read();
        let inner = self.inner.read();
        inner.hosts.values().filter(|h| h.actual_state().is_started()).count()
    }

    /// Number of instances currently installed but not running.
    pub fn installed_count(&self) -> usize {
        let _cluster = self.locks.cluster_read();
        let inner = self.inner.read();
        inner.hosts.values().filter(|h| h.actual_state().is_installed()).count()
    }

    /// Read-only status projection for the response layer.
    pub fn status(&self) -> ComponentStatus {
        let _cluster = self.locks.cluster_read();
        let inner = self.inner.read();
        let started = inner.hosts.values().filter(|h| h.actual_state().is_started()).count();
        let installed = inner.hosts.values().filter(|h| h.actual_state().is_installed()).count();
        ComponentStatus {
            cluster_id: self.owner.cluster_id(),
            cluster_name: self.owner.cluster_name(),
            service_name: self.owner.service_name(),
            component_name: self.name.clone(),
            desired_stack_id: inner.desired_stack.id(),
            desired_state: inner.desired_state,
            total_count: inner.hosts.len(),
            started_count: started,
            installed_count: installed,
        }
    }

    /// Append a recursive human-readable rendering of this node and its
    /// hosts to `out`. Read locks only.
    pub fn debug_dump(&self, out: &mut String) {
        let _cluster = self.locks.cluster_read();
        let inner = self.inner.read();
        let _ = write!(
            out,
            "ComponentNode={{ {}, clusterName={}, desiredStackVersion={}, desiredState={}, \
             durable={}, hostInstances=[",
            self.key(),
            self.owner.cluster_name(),
            inner.desired_stack,
            inner.desired_state,
            self.is_durable()
        );
        let mut entries: Vec<(&String, &HostInstance)> = inner.hosts.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let mut first = true;
        for (_, host) in entries {
            if !first {
                let _ = write!(out, ",");
            }
            first = false;
            let _ = write!(out, "\n    ");
            host.debug_dump(out);
        }
        let _ = write!(out, " ] }}");
    }
}

/// Read-only snapshot of a component for status summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentStatus {
    /// Owning cluster id
    pub cluster_id: ClusterId,
    /// Owning cluster name
    pub cluster_name: String,
    /// Owning service name
    pub service_name: String,
    /// Component name
    pub component_name: String,
    /// Desired stack identifier, `NAME-VERSION`
    pub desired_stack_id: String,
    /// Desired lifecycle state
    pub desired_state: LifecycleState,
    /// Number of host instances
    pub total_count: usize,
    /// Instances observed running
    pub started_count: usize,
    /// Instances observed installed
    pub installed_count: usize,
}
