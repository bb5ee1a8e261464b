//! Dropped input is logged, never applied.

use serde_json::json;
use tracing_test::traced_test;
use xferlink_client::{ClientConfig, MockTransport, TransferClient};

async fn connected_client() -> (TransferClient<MockTransport>, MockTransport) {
    let transport = MockTransport::new();
    let config = ClientConfig::new("ws://transfer.test:1337").unwrap();
    let client = TransferClient::new(config, transport.clone());
    client.connect().await.unwrap();
    (client, transport)
}

#[tokio::test]
#[traced_test]
async fn malformed_frame_is_logged_and_dropped() {
    let (client, transport) = connected_client().await;
    let mut updates = client.subscribe();

    transport.push_raw(b"{not json".to_vec());
    transport.push_event("status", json!("running"));
    transport.push_event("message", json!("still alive"));

    let snapshot = updates
        .wait_for(|s| s.last_message.is_some())
        .await
        .unwrap()
        .clone();

    assert!(logs_contain("dropping malformed frame"));
    assert!(snapshot.records.is_empty());
    assert!(!snapshot.is_operation_in_progress);
    assert!(client.is_connected().await);
}

#[tokio::test]
#[traced_test]
async fn unknown_event_is_logged() {
    let (client, transport) = connected_client().await;
    let mut updates = client.subscribe();

    transport.push_event("confirm", json!({"completed": true}));
    transport.push_event("message", json!("after"));

    updates
        .wait_for(|s| s.last_message.is_some())
        .await
        .unwrap();

    assert!(logs_contain("unrecognized event"));
}

#[tokio::test]
#[traced_test]
async fn unsolicited_ack_is_logged() {
    let (client, transport) = connected_client().await;
    let mut updates = client.subscribe();

    transport.push_event("ack", json!("ok"));
    transport.push_event("message", json!("after"));

    updates
        .wait_for(|s| s.last_message.is_some())
        .await
        .unwrap();

    assert!(logs_contain("unsolicited acknowledgment"));
}

#[tokio::test]
#[traced_test]
async fn connection_transitions_are_logged() {
    let (client, transport) = connected_client().await;
    let mut updates = client.subscribe();
    updates.wait_for(|s| s.is_connected()).await.unwrap();

    transport.simulate_drop("reset by peer");
    updates
        .wait_for(|s| !s.is_connected())
        .await
        .unwrap();

    assert!(logs_contain("connection state changed"));
    assert!(logs_contain("transport dropped"));
}
