use huddle_client::{MemoryBackend, PeerState};
use huddle_core::PeerId;

use crate::integration::init_tracing;
use crate::utils::{MockNetwork, new_client, test_config, wait_all_connected, wait_for_state};

/// Long enough for every retry and timeout in the default config (ms).
const FAILURE_TIMEOUT_MS: u64 = 120_000;

#[tokio::test(start_paused = true)]
async fn test_transient_publish_failures_are_retried() {
    init_tracing();

    let backend = MemoryBackend::new();
    let network = MockNetwork::new();
    let alice = PeerId::from("alice");
    let bob = PeerId::from("bob");

    let alice_call = new_client(&alice, &backend, &network, test_config())
        .start_call()
        .await
        .unwrap();

    // Alice's offer is the next record written.
    backend.fail_next_publishes(2);

    let bob_call = new_client(&bob, &backend, &network, test_config())
        .join_call(alice_call.room_id())
        .await
        .unwrap();

    let peers = wait_all_connected(&alice_call, 1).await.expect("alice not connected");
    assert_eq!(peers[0].retries, 0);
    wait_all_connected(&bob_call, 1).await.expect("bob not connected");

    assert_eq!(network.created(&alice, &bob).await, 1, "backoff retries the write, not the link");
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_publish_retries_fail_the_link() {
    init_tracing();

    let backend = MemoryBackend::new();
    let network = MockNetwork::new();
    let alice = PeerId::from("alice");
    let bob = PeerId::from("bob");

    let alice_call = new_client(&alice, &backend, &network, test_config())
        .start_call()
        .await
        .unwrap();

    backend.fail_next_publishes(1_000);

    let _bob_call = new_client(&bob, &backend, &network, test_config())
        .join_call(alice_call.room_id())
        .await
        .unwrap();

    let status = wait_for_state(&alice_call, &bob, PeerState::Failed, FAILURE_TIMEOUT_MS)
        .await
        .expect("link never failed");
    assert_eq!(status.retries, 1);
    assert_eq!(network.created(&alice, &bob).await, 2, "one rebuild, then give up");
    assert_eq!(network.closed(&alice, &bob).await, 2);
}
