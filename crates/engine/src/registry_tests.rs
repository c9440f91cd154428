// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use foreman_core::FakeClock;
use std::time::Duration;

fn registry() -> (NodeRegistry<FakeClock>, FakeClock, Arc<Store>) {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let clock = FakeClock::new();
    let registry = NodeRegistry::new(store.clone(), EventBus::new(), clock.clone()).unwrap();
    (registry, clock, store)
}

#[test]
fn register_assigns_id_when_absent() {
    let (registry, _, _) = registry();
    let node = registry.register(None, "builder-1", vec!["os:linux".into()]).unwrap();
    assert_eq!(node.id.len(), foreman_core::id::SHORT_ID_LEN);
    assert_eq!(node.status, NodeStatus::Online);
}

#[test]
fn register_same_id_twice_is_idempotent() {
    let (registry, _, store) = registry();
    let first = registry
        .register(Some("n1".into()), "builder-1", vec![])
        .unwrap();
    let second = registry
        .register(Some("n1".into()), "builder-1-renamed", vec!["gpu".into()])
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(registry.list().len(), 1);
    assert_eq!(store.list_nodes().unwrap().len(), 1);
    assert_eq!(second.name, "builder-1-renamed");
    assert_eq!(second.tags, vec!["gpu".to_string()]);
}

#[test]
fn sweep_flips_stale_nodes_offline() {
    let (registry, clock, store) = registry();
    let node = registry.register(Some("n2".into()), "n2", vec![]).unwrap();

    // Two sweeps inside the window: still online.
    clock.advance(Duration::from_secs(60));
    assert!(registry.sweep().unwrap().is_empty());
    assert_eq!(registry.get(&node.id).unwrap().status, NodeStatus::Online);

    // 120 s without a heartbeat crosses the 90 s window.
    clock.advance(Duration::from_secs(60));
    let flipped = registry.sweep().unwrap();
    assert_eq!(flipped.len(), 1);
    assert_eq!(registry.get(&node.id).unwrap().status, NodeStatus::Offline);
    // Write-through: the store agrees.
    assert_eq!(
        store.get_node(&node.id).unwrap().unwrap().status,
        NodeStatus::Offline
    );
}

#[test]
fn heartbeat_keeps_node_alive_and_revives_it() {
    let (registry, clock, _) = registry();
    let node = registry.register(Some("n3".into()), "n3", vec![]).unwrap();

    clock.advance(Duration::from_secs(120));
    registry.sweep().unwrap();
    assert_eq!(registry.get(&node.id).unwrap().status, NodeStatus::Offline);

    assert!(registry.heartbeat(&node.id).unwrap());
    assert_eq!(registry.get(&node.id).unwrap().status, NodeStatus::Online);

    clock.advance(Duration::from_secs(89));
    registry.sweep().unwrap();
    assert_eq!(registry.get(&node.id).unwrap().status, NodeStatus::Online);
}

#[test]
fn heartbeat_unknown_node_is_false() {
    let (registry, _, _) = registry();
    assert!(!registry.heartbeat("ghost").unwrap());
}

#[test]
fn restart_reloads_nodes_offline() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let clock = FakeClock::new();
    {
        let registry =
            NodeRegistry::new(store.clone(), EventBus::new(), clock.clone()).unwrap();
        registry.register(Some("n1".into()), "builder", vec![]).unwrap();
    }
    let registry = NodeRegistry::new(store.clone(), EventBus::new(), clock).unwrap();
    let node = registry.get("n1").unwrap();
    assert_eq!(node.status, NodeStatus::Offline);
    assert_eq!(node.name, "builder");
}

#[test]
fn resolve_by_id_then_unique_name() {
    let (registry, _, _) = registry();
    let node = registry.register(None, "builder-1", vec![]).unwrap();
    assert_eq!(registry.resolve(&node.id).as_deref(), Some(node.id.as_str()));
    assert_eq!(registry.resolve("builder-1").as_deref(), Some(node.id.as_str()));
    assert!(registry.resolve("nope").is_none());

    // Ambiguous names do not resolve.
    registry.register(None, "builder-1", vec![]).unwrap();
    assert!(registry.resolve("builder-1").is_none());
}

#[tokio::test]
async fn channel_attach_detach_lifecycle() {
    let (registry, _, _) = registry();
    let node = registry.register(Some("n1".into()), "n1", vec![]).unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::channel(NodeRegistry::<FakeClock>::channel_capacity());
    registry.attach_channel(&node.id, tx).unwrap();
    let channel = registry.channel(&node.id).unwrap();
    channel
        .try_send(ServerMessage::Registered { id: node.id.clone() })
        .unwrap();
    assert!(matches!(
        rx.recv().await,
        Some(ServerMessage::Registered { .. })
    ));

    registry.detach_channel(&node.id).unwrap();
    assert!(registry.channel(&node.id).is_none());
    assert_eq!(registry.get(&node.id).unwrap().status, NodeStatus::Offline);
}

#[test]
fn attach_channel_to_unknown_node_fails() {
    let (registry, _, _) = registry();
    let (tx, _rx) = tokio::sync::mpsc::channel(1);
    assert!(matches!(
        registry.attach_channel("ghost", tx),
        Err(EngineError::NodeUnknown(_))
    ));
}

#[test]
fn current_job_write_through() {
    let (registry, _, store) = registry();
    let node = registry.register(Some("n1".into()), "n1", vec![]).unwrap();
    registry.set_current_job(&node.id, Some("11223344")).unwrap();
    assert_eq!(
        store
            .get_node(&node.id)
            .unwrap()
            .unwrap()
            .current_job_id
            .as_deref(),
        Some("11223344")
    );
    registry.set_current_job(&node.id, None).unwrap();
    assert!(registry.get(&node.id).unwrap().current_job_id.is_none());
}

#[test]
fn remove_deletes_from_store() {
    let (registry, _, store) = registry();
    let node = registry.register(Some("n1".into()), "n1", vec![]).unwrap();
    assert!(registry.remove(&node.id).unwrap());
    assert!(registry.get(&node.id).is_none());
    assert!(store.get_node(&node.id).unwrap().is_none());
    assert!(!registry.remove(&node.id).unwrap());
}
