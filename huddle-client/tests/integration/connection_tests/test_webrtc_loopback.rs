use huddle_client::{
    CallClient, MemoryBackend, PeerState, SyntheticMediaSource, TransportFactory,
    WebRtcTransportFactory,
};
use huddle_core::PeerId;
use std::sync::Arc;

use crate::integration::init_tracing;
use crate::utils::{test_config, wait_for_state};

/// Timeout for real ICE connectivity on loopback (ms).
const CONNECTION_TIMEOUT_MS: u64 = 20000;

#[tokio::test]
#[ignore = "opens real UDP sockets"]
async fn test_webrtc_two_party_loopback() {
    init_tracing();

    let backend = Arc::new(MemoryBackend::new());
    let config = test_config();
    let factory: Arc<dyn TransportFactory> = Arc::new(
        WebRtcTransportFactory::new(config.transport.clone()).expect("webrtc api"),
    );
    let media = Arc::new(SyntheticMediaSource::new());

    let alice = PeerId::from("alice");
    let bob = PeerId::from("bob");

    let client = |id: &PeerId| {
        CallClient::new(
            id.clone(),
            config.clone(),
            backend.clone(),
            backend.clone(),
            factory.clone(),
            media.clone(),
        )
    };

    let alice_call = client(&alice).start_call().await.expect("start_call failed");
    let bob_call = client(&bob)
        .join_call(alice_call.room_id())
        .await
        .expect("join_call failed");

    wait_for_state(&alice_call, &bob, PeerState::Connected, CONNECTION_TIMEOUT_MS)
        .await
        .expect("alice never connected");
    wait_for_state(&bob_call, &alice, PeerState::Connected, CONNECTION_TIMEOUT_MS)
        .await
        .expect("bob never connected");

    alice_call.end_call().await.unwrap();
    bob_call.end_call().await.unwrap();
}
