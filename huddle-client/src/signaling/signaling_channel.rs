use async_trait::async_trait;
use huddle_core::{MessageId, PeerId, Result, RoomId, SignalKind, SignalMessage};
use tokio::sync::mpsc;

/// Messages of one kind addressed to one recipient.
pub struct SignalSubscription {
    kind: SignalKind,
    rx: mpsc::UnboundedReceiver<SignalMessage>,
}

impl SignalSubscription {
    pub fn new(kind: SignalKind, rx: mpsc::UnboundedReceiver<SignalMessage>) -> Self {
        Self { kind, rx }
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub async fn recv(&mut self) -> Option<SignalMessage> {
        self.rx.recv().await
    }
}

/// Per-room mailbox used to exchange negotiation messages.
///
/// Delivery is at-least-once and unordered across senders; consumers must
/// tolerate duplicates.
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    async fn publish(&self, message: SignalMessage) -> Result<()>;

    /// Every stored message for `recipient` of `kind` that has not been
    /// acknowledged yet, followed by every new one.
    async fn subscribe(
        &self,
        room: &RoomId,
        recipient: &PeerId,
        kind: SignalKind,
    ) -> Result<SignalSubscription>;

    /// Delete a consumed message so it is not replayed.
    async fn acknowledge(&self, room: &RoomId, id: MessageId) -> Result<()>;

    /// Delete every message `sender` left in the room.
    async fn purge_from(&self, room: &RoomId, sender: &PeerId) -> Result<()>;

    /// Delete every message `sender` left for `recipient`.
    async fn purge_between(&self, room: &RoomId, sender: &PeerId, recipient: &PeerId)
    -> Result<()>;

    /// Delete every message addressed to `recipient`, whoever sent it.
    async fn purge_to(&self, room: &RoomId, recipient: &PeerId) -> Result<()>;
}
