use huddle_client::{MemoryBackend, PeerState};
use huddle_core::PeerId;
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{
    MockNetwork, SETTLE_TIMEOUT_MS, new_client, status_of, test_config, wait_all_connected,
    wait_for_peers, wait_for_state,
};

#[tokio::test]
async fn test_dropped_handle_leaves_and_peers_clean_up() {
    init_tracing();

    let backend = MemoryBackend::new();
    let network = MockNetwork::new();
    let a = PeerId::from("a");
    let b = PeerId::from("b");
    let c = PeerId::from("c");

    let a_call = new_client(&a, &backend, &network, test_config())
        .start_call()
        .await
        .unwrap();
    let room = a_call.room_id().clone();
    let b_call = new_client(&b, &backend, &network, test_config())
        .join_call(&room)
        .await
        .unwrap();
    let c_call = new_client(&c, &backend, &network, test_config())
        .join_call(&room)
        .await
        .unwrap();

    wait_all_connected(&a_call, 2).await.unwrap();
    wait_all_connected(&b_call, 2).await.unwrap();
    wait_all_connected(&c_call, 2).await.unwrap();

    drop(c_call);

    wait_for_peers(&a_call, SETTLE_TIMEOUT_MS, |peers| peers.len() == 1)
        .await
        .expect("a kept the link to c");
    let b_peers = wait_for_peers(&b_call, SETTLE_TIMEOUT_MS, |peers| peers.len() == 1)
        .await
        .expect("b kept the link to c");

    assert!(!backend.participants(&room).unwrap().contains(&c));
    assert_eq!(status_of(&b_peers, &a).unwrap().state, PeerState::Connected);
    assert_eq!(status_of(&b_peers, &a).unwrap().generation, 1, "a-b link untouched");

    assert_eq!(network.closed(&a, &c).await, 1);
    assert_eq!(network.closed(&b, &c).await, 1);
    assert_eq!(network.closed(&c, &a).await, 1);
    assert_eq!(network.closed(&c, &b).await, 1);
    assert_eq!(network.closed(&a, &b).await, 0);
}

#[tokio::test]
async fn test_participant_can_rejoin() {
    init_tracing();

    let backend = MemoryBackend::new();
    let network = MockNetwork::new();
    let a = PeerId::from("a");
    let c = PeerId::from("c");

    let a_call = new_client(&a, &backend, &network, test_config())
        .start_call()
        .await
        .unwrap();
    let room = a_call.room_id().clone();

    let c_call = new_client(&c, &backend, &network, test_config())
        .join_call(&room)
        .await
        .unwrap();
    wait_all_connected(&a_call, 1).await.unwrap();
    c_call.end_call().await.unwrap();

    wait_for_peers(&a_call, SETTLE_TIMEOUT_MS, |peers| peers.is_empty())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let c_again = new_client(&c, &backend, &network, test_config())
        .join_call(&room)
        .await
        .unwrap();

    let status = wait_for_state(&a_call, &c, PeerState::Connected, SETTLE_TIMEOUT_MS)
        .await
        .expect("rejoined participant never connected");
    assert_eq!(status.round, 0, "a fresh link starts over");
    wait_all_connected(&c_again, 1).await.unwrap();
    assert_eq!(network.created(&a, &c).await, 2);
}
