use huddle_client::{MemoryBackend, PeerState, Role, SignalingChannel};
use huddle_core::{PeerId, SignalKind, SignalMessage, SignalPayload};
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{
    MockNetwork, SETTLE_TIMEOUT_MS, ScriptedPeer, new_client, test_config, wait_for_state,
};

#[tokio::test]
async fn test_initiator_ignores_offers_and_stale_answers() {
    init_tracing();

    let backend = MemoryBackend::new();
    let network = MockNetwork::new();
    let bob = PeerId::from("bob");

    let bob_call = new_client(&bob, &backend, &network, test_config())
        .start_call()
        .await
        .unwrap();
    let room = bob_call.room_id().clone();
    let zed = ScriptedPeer::join(&backend, &room, "zed").await.unwrap();

    let offer = zed
        .wait_for(SignalKind::Offer, SETTLE_TIMEOUT_MS)
        .await
        .expect("bob never offered");
    assert_eq!(offer.round, 0);

    let status = wait_for_state(&bob_call, &zed.peer_id, PeerState::OfferSent, SETTLE_TIMEOUT_MS)
        .await
        .unwrap();
    assert_eq!(status.role, Role::Initiator);

    // Glare: bob already offered, so a counter-offer is not answered.
    zed.offer(&bob, 0).await.unwrap();
    // Answer for a round bob never opened.
    zed.send(
        &bob,
        5,
        SignalPayload::Answer {
            sdp: "v=0 mock-answer zed->bob".to_owned(),
        },
    )
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(zed.received(SignalKind::Answer).is_empty());
    assert_eq!(network.answers(&bob, &zed.peer_id).await, 0);
    wait_for_state(&bob_call, &zed.peer_id, PeerState::OfferSent, SETTLE_TIMEOUT_MS)
        .await
        .unwrap();

    zed.send(
        &bob,
        0,
        SignalPayload::Answer {
            sdp: "v=0 mock-answer zed->bob".to_owned(),
        },
    )
    .await
    .unwrap();
    zed.candidate(&bob, 0).await.unwrap();

    wait_for_state(&bob_call, &zed.peer_id, PeerState::Connected, SETTLE_TIMEOUT_MS)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_messages_from_strangers_are_dropped() {
    init_tracing();

    let backend = MemoryBackend::new();
    let network = MockNetwork::new();
    let bob = PeerId::from("bob");

    let bob_call = new_client(&bob, &backend, &network, test_config())
        .start_call()
        .await
        .unwrap();
    let room = bob_call.room_id().clone();
    let ghost = PeerId::from("ghost");

    backend
        .publish(SignalMessage::new(
            room.clone(),
            ghost.clone(),
            bob.clone(),
            0,
            SignalPayload::Offer {
                sdp: "v=0 mock-offer ghost->bob".to_owned(),
            },
        ))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(bob_call.peers().await.unwrap().is_empty());
    assert_eq!(network.created(&bob, &ghost).await, 0);
    assert!(
        backend.stored_messages(&room).is_empty(),
        "consumed records are acknowledged"
    );
}
