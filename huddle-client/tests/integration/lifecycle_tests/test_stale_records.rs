use huddle_client::{MemoryBackend, PeerState, RoomDirectory};
use huddle_core::{PeerId, SignalKind, SignalPayload};

use crate::integration::init_tracing;
use crate::utils::{
    MockNetwork, SETTLE_TIMEOUT_MS, ScriptedPeer, new_client, test_config, wait_all_connected,
    wait_for_peers, wait_for_state,
};

#[tokio::test]
async fn test_rejoin_ignores_offer_from_earlier_visit() {
    init_tracing();

    let backend = MemoryBackend::new();
    let network = MockNetwork::new();
    let room = backend.create_room().await.unwrap();
    let alice = ScriptedPeer::join(&backend, &room, "alice").await.unwrap();
    let bob = PeerId::from("bob");

    // Left over from a visit that ended before bob read it.
    alice
        .send(
            &bob,
            0,
            SignalPayload::Offer {
                sdp: "v=0 mock-offer alice->bob earlier visit".to_owned(),
            },
        )
        .await
        .unwrap();

    let bob_call = new_client(&bob, &backend, &network, test_config())
        .join_call(&room)
        .await
        .unwrap();
    assert!(
        backend
            .stored_messages(&room)
            .iter()
            .all(|m| m.to != bob),
        "records addressed to bob before the join are cleared"
    );
    wait_for_state(&bob_call, &alice.peer_id, PeerState::AwaitingOffer, SETTLE_TIMEOUT_MS)
        .await
        .unwrap();

    let fresh = "v=0 mock-offer alice->bob this visit".to_owned();
    alice
        .send(&bob, 0, SignalPayload::Offer { sdp: fresh.clone() })
        .await
        .unwrap();
    alice
        .wait_for(SignalKind::Answer, SETTLE_TIMEOUT_MS)
        .await
        .expect("bob never answered the current offer");
    alice.candidate(&bob, 0).await.unwrap();

    let status = wait_for_state(&bob_call, &alice.peer_id, PeerState::Connected, SETTLE_TIMEOUT_MS)
        .await
        .unwrap();
    assert_eq!(status.retries, 0);
    assert_eq!(status.generation, 1);
    assert_eq!(network.remote_offers(&bob, &alice.peer_id).await, vec![fresh]);
    assert_eq!(alice.received(SignalKind::Answer).len(), 1);
}

#[tokio::test]
async fn test_closed_link_withdraws_unread_records() {
    init_tracing();

    let backend = MemoryBackend::new();
    let network = MockNetwork::new();
    let alice = PeerId::from("alice");

    let alice_call = new_client(&alice, &backend, &network, test_config())
        .start_call()
        .await
        .unwrap();
    let room = alice_call.room_id().clone();

    // Bob's first visit ends before it reads anything.
    let bob = ScriptedPeer::join(&backend, &room, "bob").await.unwrap();
    bob.wait_for(SignalKind::Offer, SETTLE_TIMEOUT_MS)
        .await
        .expect("alice never offered");
    bob.leave().await.unwrap();

    wait_for_peers(&alice_call, SETTLE_TIMEOUT_MS, |peers| peers.is_empty())
        .await
        .expect("alice kept the link to bob");
    assert!(bob.received(SignalKind::Offer).is_empty());
    assert!(bob.received(SignalKind::Candidate).is_empty());

    let bob_call = new_client(&bob.peer_id, &backend, &network, test_config())
        .join_call(&room)
        .await
        .unwrap();

    wait_all_connected(&alice_call, 1).await.unwrap();
    let peers = wait_all_connected(&bob_call, 1).await.unwrap();
    assert_eq!(peers[0].retries, 0);
    assert_eq!(network.remote_offers(&bob.peer_id, &alice).await.len(), 1);
    assert_eq!(network.answers(&bob.peer_id, &alice).await, 1);
}
