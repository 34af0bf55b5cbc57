//! Reusable fixtures: an in-memory persistence gateway with call counters,
//! a canned stack-metadata table, and a stub service owner.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::error::{ControlError, ControlResult};
use crate::locking::LockCoordinator;
use crate::metadata::{ComponentProfile, StackMetadataLookup};
use crate::persistence::{
    ComponentKey, ComponentRecord, HostKey, HostRecord, PersistenceGateway, StoreError,
};
use crate::service::{ClusterId, ComponentOwner};
use crate::state::StackVersion;

/// In-memory [`PersistenceGateway`] that counts every call, so tests can
/// assert exact write counts.
pub struct MemoryGateway {
    components: Mutex<HashMap<ComponentKey, ComponentRecord>>,
    hosts: Mutex<HashMap<HostKey, HostRecord>>,
    component_creates: AtomicUsize,
    component_merges: AtomicUsize,
    component_refreshes: AtomicUsize,
    component_removes: AtomicUsize,
    host_creates: AtomicUsize,
    host_merges: AtomicUsize,
    host_refreshes: AtomicUsize,
    host_removes: AtomicUsize,
    host_lists: AtomicUsize,
}

impl MemoryGateway {
    /// Create an empty gateway.
    pub fn new() -> Self {
        MemoryGateway {
            components: Mutex::new(HashMap::new()),
            hosts: Mutex::new(HashMap::new()),
            component_creates: AtomicUsize::new(0),
            component_merges: AtomicUsize::new(0),
            component_refreshes: AtomicUsize::new(0),
            component_removes: AtomicUsize::new(0),
            host_creates: AtomicUsize::new(0),
            host_merges: AtomicUsize::new(0),
            host_refreshes: AtomicUsize::new(0),
            host_removes: AtomicUsize::new(0),
            host_lists: AtomicUsize::new(0),
        }
    }

    /// Number of component create calls.
    pub fn component_create_count(&self) -> usize {
        self.component_creates.load(Ordering::SeqCst)
    }

    /// Number of component merge calls.
    pub fn component_merge_count(&self) -> usize {
        self.component_merges.load(Ordering::SeqCst)
    }

    /// Number of component refresh calls.
    pub fn component_refresh_count(&self) -> usize {
        self.component_refreshes.load(Ordering::SeqCst)
    }

    /// Number of component remove calls.
    pub fn component_remove_count(&self) -> usize {
        self.component_removes.load(Ordering::SeqCst)
    }

    /// Number of host create calls.
    pub fn host_create_count(&self) -> usize {
        self.host_creates.load(Ordering::SeqCst)
    }

    /// Number of host merge calls.
    pub fn host_merge_count(&self) -> usize {
        self.host_merges.load(Ordering::SeqCst)
    }

    /// Number of host remove calls.
    pub fn host_remove_count(&self) -> usize {
        self.host_removes.load(Ordering::SeqCst)
    }

    /// Total number of gateway calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.component_create_count()
            + self.component_merge_count()
            + self.component_refresh_count()
            + self.component_remove_count()
            + self.host_create_count()
            + self.host_merge_count()
            + self.host_refreshes.load(Ordering::SeqCst)
            + self.host_remove_count()
            + self.host_lists.load(Ordering::SeqCst)
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceGateway for MemoryGateway {
    fn create_component(&self, record: &ComponentRecord) -> Result<(), StoreError> {
        self.component_creates.fetch_add(1, Ordering::SeqCst);
        let mut components = self.components.lock();
        if components.contains_key(&record.key) {
            return Err(StoreError::Backend(format!(
                "component record already exists: {}",
                record.key
            )));
        }
        components.insert(record.key.clone(), record.clone());
        Ok(())
    }

    fn merge_component(&self, record: &ComponentRecord) -> Result<(), StoreError> {
        self.component_merges.fetch_add(1, Ordering::SeqCst);
        self.components.lock().insert(record.key.clone(), record.clone());
        Ok(())
    }

    fn refresh_component(&self, key: &ComponentKey) -> Result<ComponentRecord, StoreError> {
        self.component_refreshes.fetch_add(1, Ordering::SeqCst);
        self.components
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::MissingRecord(key.to_string()))
    }

    fn remove_component(&self, key: &ComponentKey) -> Result<(), StoreError> {
        self.component_removes.fetch_add(1, Ordering::SeqCst);
        self.components
            .lock()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::MissingRecord(key.to_string()))
    }

    fn create_host(&self, record: &HostRecord) -> Result<(), StoreError> {
        self.host_creates.fetch_add(1, Ordering::SeqCst);
        let mut hosts = self.hosts.lock();
        if hosts.contains_key(&record.key) {
            return Err(StoreError::Backend(format!(
                "host record already exists: {}",
                record.key
            )));
        }
        hosts.insert(record.key.clone(), record.clone());
        Ok(())
    }

    fn merge_host(&self, record: &HostRecord) -> Result<(), StoreError> {
        self.host_merges.fetch_add(1, Ordering::SeqCst);
        self.hosts.lock().insert(record.key.clone(), record.clone());
        Ok(())
    }

    fn refresh_host(&self, key: &HostKey) -> Result<HostRecord, StoreError> {
        self.host_refreshes.fetch_add(1, Ordering::SeqCst);
        self.hosts
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::MissingRecord(key.to_string()))
    }

    fn remove_host(&self, key: &HostKey) -> Result<(), StoreError> {
        self.host_removes.fetch_add(1, Ordering::SeqCst);
        self.hosts
            .lock()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::MissingRecord(key.to_string()))
    }

    fn host_records(&self, key: &ComponentKey) -> Result<Vec<HostRecord>, StoreError> {
        self.host_lists.fetch_add(1, Ordering::SeqCst);
        let hosts = self.hosts.lock();
        let mut records: Vec<HostRecord> = hosts
            .values()
            .filter(|record| record.key.component == *key)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.key.host.cmp(&b.key.host));
        Ok(records)
    }
}

/// Components every [`FixtureMetadata::with_defaults`] table recognizes,
/// as (service, component, profile).
static DEFAULT_COMPONENTS: Lazy<Vec<(&'static str, &'static str, ComponentProfile)>> =
    Lazy::new(|| {
        vec![
            (
                "datastore",
                "datastore-master",
                ComponentProfile { is_client: false, is_master: true },
            ),
            (
                "datastore",
                "datastore-node",
                ComponentProfile { is_client: false, is_master: false },
            ),
            (
                "datastore",
                "datastore-client",
                ComponentProfile { is_client: true, is_master: false },
            ),
            (
                "gateway",
                "gateway-server",
                ComponentProfile { is_client: false, is_master: true },
            ),
        ]
    });

/// Canned stack-metadata table.
pub struct FixtureMetadata {
    known: HashMap<(String, String), ComponentProfile>,
}

impl FixtureMetadata {
    /// Create an empty table that recognizes nothing.
    pub fn new() -> Self {
        FixtureMetadata { known: HashMap::new() }
    }

    /// Create a table seeded with the default fixture components.
    pub fn with_defaults() -> Self {
        let mut metadata = Self::new();
        for (service, component, profile) in DEFAULT_COMPONENTS.iter() {
            metadata = metadata.recognize(service, component, *profile);
        }
        metadata
    }

    /// Add a recognized (service, component) pair.
    pub fn recognize(mut self, service: &str, component: &str, profile: ComponentProfile) -> Self {
        self.known.insert((service.to_string(), component.to_string()), profile);
        self
    }
}

impl Default for FixtureMetadata {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl StackMetadataLookup for FixtureMetadata {
    fn lookup_component(
        &self,
        stack: &StackVersion,
        service: &str,
        component: &str,
    ) -> ControlResult<ComponentProfile> {
        self.known
            .get(&(service.to_string(), component.to_string()))
            .copied()
            .ok_or_else(|| {
                ControlError::NotFound(format!(
                    "stack={}, service={}, component={}",
                    stack, service, component
                ))
            })
    }
}

/// Stub [`ComponentOwner`] with a refresh counter.
pub struct TestOwner {
    cluster_id: ClusterId,
    cluster_name: String,
    service_name: String,
    stack: StackVersion,
    locks: Arc<LockCoordinator>,
    refreshes: AtomicUsize,
}

impl TestOwner {
    /// Create an owner for `cluster_name` / `service_name` on the default
    /// fixture stack.
    pub fn new(cluster_name: &str, service_name: &str) -> Self {
        Self::with_stack(cluster_name, service_name, StackVersion::new("fleet", "2.1.0"))
    }

    /// Create an owner on a specific stack version.
    pub fn with_stack(cluster_name: &str, service_name: &str, stack: StackVersion) -> Self {
        TestOwner {
            cluster_id: ClusterId::new(),
            cluster_name: cluster_name.to_string(),
            service_name: service_name.to_string(),
            stack,
            locks: Arc::new(LockCoordinator::new()),
            refreshes: AtomicUsize::new(0),
        }
    }

    /// How many times a component has requested a derived-view refresh.
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

impl ComponentOwner for TestOwner {
    fn cluster_id(&self) -> ClusterId {
        self.cluster_id
    }

    fn cluster_name(&self) -> String {
        self.cluster_name.clone()
    }

    fn service_name(&self) -> String {
        self.service_name.clone()
    }

    fn desired_stack_version(&self) -> StackVersion {
        self.stack.clone()
    }

    fn lock_coordinator(&self) -> Arc<LockCoordinator> {
        Arc::clone(&self.locks)
    }

    fn refresh(&self) -> ControlResult<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
