use async_trait::async_trait;
use huddle_core::{Participants, PeerId, Result, RoomId};
use tokio::sync::mpsc;

/// Live feed of membership snapshots for one room.
///
/// The first snapshot is the state at subscription time. Dropping the watch
/// ends the subscription.
pub struct ParticipantWatch {
    rx: mpsc::UnboundedReceiver<Participants>,
}

impl ParticipantWatch {
    pub fn new(rx: mpsc::UnboundedReceiver<Participants>) -> Self {
        Self { rx }
    }

    /// `None` once the backend dropped the room feed.
    pub async fn next(&mut self) -> Option<Participants> {
        self.rx.recv().await
    }
}

/// Tracks which participants belong to which call room.
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    /// Allocate a room with no participants.
    async fn create_room(&self) -> Result<RoomId>;

    /// Add `peer_id` to the room. Joining twice is a no-op.
    async fn join_room(&self, room: &RoomId, peer_id: &PeerId) -> Result<()>;

    /// Remove `peer_id` from the room. Leaving twice is a no-op.
    async fn leave_room(&self, room: &RoomId, peer_id: &PeerId) -> Result<()>;

    async fn watch_participants(&self, room: &RoomId) -> Result<ParticipantWatch>;
}
