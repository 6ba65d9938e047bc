use crate::peer::PeerState;
use crate::transport::RemoteTrackInfo;
use huddle_core::{Participants, PeerId};

/// What the call session reports to the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// New membership snapshot of the room.
    ParticipantsChanged(Participants),

    PeerStateChanged { peer_id: PeerId, state: PeerState },

    /// Remote audio or video arrived and can be rendered.
    RemoteTrack { peer_id: PeerId, track: RemoteTrackInfo },

    /// The session finished its teardown. Always the last event.
    Ended,
}
