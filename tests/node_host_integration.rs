//! Integration tests for the node init/deliver contract

mod common;

use common::builders::{lettered, letters, opc_config};
use common::mock_helpers::{spy_factory, OpcServer};
use common::within_timeout;
use pixelflow_rs::backend::SinkConfig;
use pixelflow_rs::pipeline::{
    DeliveryOutcome, InitOutcome, NodeHost, NodeId, NodeType, OutputDefaults, RawConfig,
};

#[tokio::test]
async fn test_opc_node_binds_addresses_in_index_order() {
    let host = NodeHost::new(OutputDefaults::default());
    let raw = RawConfig::new()
        .with("count", 2i64)
        .with("address0", "10.0.0.1:7890")
        .with("address1", "10.0.0.2:7890");

    let outcome = host
        .on_init(NodeId(1), NodeType::OpcMultiOutput, &raw)
        .await
        .unwrap();
    assert_eq!(outcome, InitOutcome::Created);

    let sink = host.sink(NodeId(1)).await.unwrap();
    assert_eq!(
        sink.as_network().unwrap().addresses(),
        &["10.0.0.1:7890".to_string(), "10.0.0.2:7890".to_string()]
    );
    host.shutdown().await;
}

#[tokio::test]
async fn test_missing_count_creates_nothing() {
    let (factory, spy) = spy_factory();
    let host = NodeHost::with_factory(OutputDefaults::default(), factory);
    let raw = RawConfig::new()
        .with("address0", "10.0.0.1:7890")
        .with("address1", "10.0.0.2:7890");

    let outcome = host
        .on_init(NodeId(1), NodeType::OpcMultiOutput, &raw)
        .await
        .unwrap();

    assert!(matches!(outcome, InitOutcome::Skipped(_)));
    assert_eq!(spy.built(), 0);
    assert!(host.sink(NodeId(1)).await.is_none());
    assert_eq!(
        host.on_deliver(NodeId(1), lettered(2, 1)).await.unwrap(),
        DeliveryOutcome::NoInstance
    );
}

#[tokio::test]
async fn test_reinit_reuses_then_rebuilds() {
    let (factory, spy) = spy_factory();
    let host = NodeHost::with_factory(OutputDefaults::default(), factory);
    let node = NodeId(7);

    let first = opc_config(&["10.0.0.1", "10.0.0.2"]);
    let remapped = opc_config(&["10.0.0.1", "10.0.0.2"]).with("mapFlip", "vertical");
    let moved = opc_config(&["10.0.0.1", "10.0.0.3"]);

    let kind = NodeType::OpcMultiOutput;
    assert_eq!(host.on_init(node, kind, &first).await.unwrap(), InitOutcome::Created);
    assert_eq!(host.on_init(node, kind, &remapped).await.unwrap(), InitOutcome::Reused);
    assert_eq!(host.on_init(node, kind, &moved).await.unwrap(), InitOutcome::Rebuilt);

    assert_eq!(spy.built(), 2);
    assert_eq!(spy.closes(), 1);
    match spy.configs().last() {
        Some(SinkConfig::NetworkFanout(config)) => {
            assert_eq!(config.addresses[1], "10.0.0.3:7890")
        }
        other => panic!("unexpected config {:?}", other),
    }
}

#[tokio::test]
async fn test_deliver_applies_wiring_before_the_sink() {
    let (factory, spy) = spy_factory();
    let host = NodeHost::with_factory(OutputDefaults::default(), factory);
    let raw = opc_config(&["a", "b", "c", "d"])
        .with("mapStart", "bottom-left")
        .with("mapOrientation", "vertical");

    host.on_init(NodeId(2), NodeType::OpcMultiOutput, &raw)
        .await
        .unwrap();
    let outcome = host.on_deliver(NodeId(2), lettered(2, 2)).await.unwrap();

    assert_eq!(outcome, DeliveryOutcome::Sent);
    // AB / CD, columns read upwards from the bottom-left corner
    assert_eq!(letters(&spy.batches()[0]), "CADB");
}

#[tokio::test]
async fn test_mapped_frames_reach_their_addresses() {
    let left = OpcServer::bind().await;
    let right = OpcServer::bind().await;
    let host = NodeHost::new(OutputDefaults::default());
    let raw = opc_config(&[&left.address, &right.address]).with("mapFlip", "horizontal");

    host.on_init(NodeId(3), NodeType::OpcMultiOutput, &raw)
        .await
        .unwrap();

    let (outcome, l, r) = within_timeout(async {
        tokio::join!(
            host.on_deliver(NodeId(3), lettered(2, 1)),
            left.read_messages(1),
            right.read_messages(1),
        )
    })
    .await;

    assert_eq!(outcome.unwrap(), DeliveryOutcome::Sent);
    assert_eq!(l[0].2, b"B");
    assert_eq!(r[0].2, b"A");
    host.shutdown().await;
}

#[tokio::test]
async fn test_removed_node_stops_receiving() {
    let (factory, spy) = spy_factory();
    let host = NodeHost::with_factory(OutputDefaults::default(), factory);
    host.on_init(NodeId(5), NodeType::OpcMultiOutput, &opc_config(&["a"]))
        .await
        .unwrap();

    assert!(host.on_remove(NodeId(5)).await);
    assert!(!host.on_remove(NodeId(5)).await);
    assert_eq!(
        host.on_deliver(NodeId(5), lettered(1, 1)).await.unwrap(),
        DeliveryOutcome::NoInstance
    );
    assert_eq!(spy.closes(), 1);
    assert!(host.node_ids().is_empty());
}
