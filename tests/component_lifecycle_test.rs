// End-to-end component lifecycle against the in-memory store.

use std::collections::HashMap;
use std::sync::Arc;

use cluster_rollout::testing::{FixtureMetadata, MemoryGateway, TestOwner};
use cluster_rollout::{
    ComponentNode, ComponentOwner, ControlError, HostInstance, LifecycleState, PersistenceGateway,
    StackVersion,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn new_component(
    owner: &Arc<TestOwner>,
    store: &Arc<MemoryGateway>,
    name: &str,
) -> ComponentNode {
    let metadata = FixtureMetadata::with_defaults();
    ComponentNode::new(
        owner.clone() as Arc<dyn ComponentOwner>,
        name,
        &metadata,
        store.clone() as Arc<dyn PersistenceGateway>,
    )
    .unwrap()
}

#[test]
fn declare_persist_and_reload_a_component() {
    init_logging();
    let owner = Arc::new(TestOwner::new("alpha", "datastore"));
    let store = Arc::new(MemoryGateway::new());
    let component = new_component(&owner, &store, "datastore-node");

    // Declare the component on three hosts and persist everything.
    for host in ["web-01", "web-02", "web-03"] {
        component.add_host(host).unwrap();
    }
    component.persist().unwrap();
    for host in ["web-01", "web-02", "web-03"] {
        component.persist_host(host).unwrap();
    }
    component.set_desired_state(LifecycleState::Installed).unwrap();
    component
        .set_host_actual_state("web-01", LifecycleState::Installed)
        .unwrap();

    // Reload from the store as a cluster restart would.
    let record = store.refresh_component(&component.key()).unwrap();
    let metadata = FixtureMetadata::with_defaults();
    let rebuilt = ComponentNode::from_record(
        owner.clone() as Arc<dyn ComponentOwner>,
        record,
        &metadata,
        store.clone() as Arc<dyn PersistenceGateway>,
    )
    .unwrap();

    assert!(rebuilt.is_durable());
    assert_eq!(rebuilt.desired_state(), LifecycleState::Installed);
    assert_eq!(rebuilt.total_count(), 3);
    assert_eq!(
        rebuilt.get_host("web-01").unwrap().actual_state(),
        LifecycleState::Installed
    );
}

#[test]
fn bulk_add_keys_must_match_host_names() {
    init_logging();
    let owner = Arc::new(TestOwner::new("alpha", "datastore"));
    let store = Arc::new(MemoryGateway::new());
    let component = new_component(&owner, &store, "datastore-node");

    let mut batch = HashMap::new();
    batch.insert("web-01".to_string(), HostInstance::new("web-01"));
    batch.insert("wrong-key".to_string(), HostInstance::new("web-02"));

    let err = component.add_hosts(batch).unwrap_err();
    assert!(matches!(err, ControlError::InvalidArgument(_)));
    assert!(component.list_hosts().is_empty());

    let mut batch = HashMap::new();
    batch.insert("web-01".to_string(), HostInstance::new("web-01"));
    batch.insert("web-02".to_string(), HostInstance::new("web-02"));
    component.add_hosts(batch).unwrap();
    assert_eq!(component.total_count(), 2);
}

#[test]
fn deletion_is_blocked_until_every_member_is_removable() {
    init_logging();
    let owner = Arc::new(TestOwner::new("alpha", "datastore"));
    let store = Arc::new(MemoryGateway::new());
    let component = new_component(&owner, &store, "datastore-node");

    component.add_host("web-01").unwrap();
    component.add_host("web-02").unwrap();
    component
        .set_host_actual_state("web-01", LifecycleState::Started)
        .unwrap();

    assert!(!component.can_be_removed());
    let err = component.delete().unwrap_err();
    assert!(matches!(err, ControlError::Precondition(_)));
    assert_eq!(component.total_count(), 2);

    component
        .set_host_actual_state("web-01", LifecycleState::Installed)
        .unwrap();
    assert!(component.can_be_removed());
    component.delete().unwrap();
    assert_eq!(component.total_count(), 0);
}

#[test]
fn delete_removes_durable_records_and_reverts_durability() {
    init_logging();
    let owner = Arc::new(TestOwner::new("alpha", "datastore"));
    let store = Arc::new(MemoryGateway::new());
    let component = new_component(&owner, &store, "datastore-node");

    component.persist().unwrap();
    component.add_host("web-01").unwrap();
    component.persist_host("web-01").unwrap();

    component.delete().unwrap();
    assert!(!component.is_durable());
    assert_eq!(store.host_remove_count(), 1);
    assert_eq!(store.component_remove_count(), 1);

    // The component can be persisted again as a fresh record.
    component.persist().unwrap();
    assert!(component.is_durable());
    assert_eq!(store.component_create_count(), 2);
}

#[test]
fn durable_state_changes_write_through_once_per_call() {
    init_logging();
    let owner = Arc::new(TestOwner::new("alpha", "datastore"));
    let store = Arc::new(MemoryGateway::new());
    let component = new_component(&owner, &store, "datastore-node");

    component.persist().unwrap();
    assert_eq!(owner.refresh_count(), 1);

    component.set_desired_state(LifecycleState::Installed).unwrap();
    component
        .set_desired_stack_version(StackVersion::new("fleet", "2.2.0"))
        .unwrap();
    assert_eq!(store.component_merge_count(), 2);

    // The stored record reflects the latest write.
    let record = store.refresh_component(&component.key()).unwrap();
    assert_eq!(record.desired_state, LifecycleState::Installed);
    assert!(record.desired_stack.contains("2.2.0"));
}

#[test]
fn status_and_dump_reflect_the_fleet() {
    init_logging();
    let owner = Arc::new(TestOwner::new("alpha", "datastore"));
    let store = Arc::new(MemoryGateway::new());
    let component = new_component(&owner, &store, "datastore-node");

    for host in ["web-01", "web-02", "web-03", "web-04"] {
        component.add_host(host).unwrap();
    }
    for host in ["web-01", "web-02"] {
        component
            .set_host_actual_state(host, LifecycleState::Started)
            .unwrap();
    }
    component
        .set_host_actual_state("web-03", LifecycleState::Installed)
        .unwrap();

    let status = component.status();
    assert_eq!(status.cluster_id, owner.cluster_id());
    assert_eq!(status.total_count, 4);
    assert_eq!(status.started_count, 2);
    assert_eq!(status.installed_count, 1);

    let json = serde_json::to_string(&status).unwrap();
    assert!(json.contains("\"component_name\":\"datastore-node\""));

    let mut dump = String::new();
    component.debug_dump(&mut dump);
    for host in ["web-01", "web-02", "web-03", "web-04"] {
        assert!(dump.contains(host));
    }
}
