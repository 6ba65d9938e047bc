use crate::directory::{ParticipantWatch, RoomDirectory};
use crate::signaling::{SignalSubscription, SignalingChannel};
use async_trait::async_trait;
use dashmap::DashMap;
use huddle_core::{
    CallError, MessageId, Participants, PeerId, Result, RoomId, SignalKind, SignalMessage,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Default)]
struct RoomRecord {
    participants: Participants,
    watchers: Vec<mpsc::UnboundedSender<Participants>>,
}

impl RoomRecord {
    fn notify(&mut self) {
        let snapshot = self.participants.clone();
        self.watchers.retain(|w| w.send(snapshot.clone()).is_ok());
    }
}

struct Subscriber {
    recipient: PeerId,
    kind: SignalKind,
    tx: mpsc::UnboundedSender<SignalMessage>,
}

impl Subscriber {
    fn wants(&self, message: &SignalMessage) -> bool {
        message.to == self.recipient && message.kind() == self.kind
    }
}

#[derive(Default)]
struct Mailbox {
    messages: Vec<SignalMessage>,
    subscribers: Vec<Subscriber>,
}

struct MemoryInner {
    rooms: DashMap<RoomId, RoomRecord>,
    mailboxes: DashMap<RoomId, Mailbox>,
    duplicate_delivery: AtomicBool,
    failing_publishes: AtomicU32,
}

/// Document-store stand-in that keeps rooms and signaling mailboxes in
/// process memory. Cloning shares the same store.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                rooms: DashMap::new(),
                mailboxes: DashMap::new(),
                duplicate_delivery: AtomicBool::new(false),
                failing_publishes: AtomicU32::new(0),
            }),
        }
    }

    /// Deliver every signaling message twice, as an at-least-once store may.
    pub fn set_duplicate_delivery(&self, enabled: bool) {
        self.inner
            .duplicate_delivery
            .store(enabled, Ordering::SeqCst);
    }

    /// Make the next `count` publishes fail with a backend error.
    pub fn fail_next_publishes(&self, count: u32) {
        self.inner.failing_publishes.store(count, Ordering::SeqCst);
    }

    pub fn participants(&self, room: &RoomId) -> Option<Participants> {
        self.inner
            .rooms
            .get(room)
            .map(|r| r.participants.clone())
    }

    /// Messages still stored (published and not acknowledged) in `room`.
    pub fn stored_messages(&self, room: &RoomId) -> Vec<SignalMessage> {
        self.inner
            .mailboxes
            .get(room)
            .map(|m| m.messages.clone())
            .unwrap_or_default()
    }

    fn ensure_room(&self, room: &RoomId) -> Result<()> {
        if self.inner.rooms.contains_key(room) {
            Ok(())
        } else {
            Err(CallError::RoomNotFound(room.clone()))
        }
    }

    fn take_injected_failure(&self) -> bool {
        self.inner
            .failing_publishes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomDirectory for MemoryBackend {
    async fn create_room(&self) -> Result<RoomId> {
        let room = RoomId::new();
        self.inner.rooms.insert(room.clone(), RoomRecord::default());
        info!("Created room {}", room);
        Ok(room)
    }

    async fn join_room(&self, room: &RoomId, peer_id: &PeerId) -> Result<()> {
        let mut record = self
            .inner
            .rooms
            .get_mut(room)
            .ok_or_else(|| CallError::RoomNotFound(room.clone()))?;

        if record.participants.insert(peer_id.clone()) {
            info!("{:?} joined room {}", peer_id, room);
            record.notify();
        }
        Ok(())
    }

    async fn leave_room(&self, room: &RoomId, peer_id: &PeerId) -> Result<()> {
        let mut record = self
            .inner
            .rooms
            .get_mut(room)
            .ok_or_else(|| CallError::RoomNotFound(room.clone()))?;

        if record.participants.remove(peer_id) {
            info!("{:?} left room {}", peer_id, room);
            record.notify();
        }
        Ok(())
    }

    async fn watch_participants(&self, room: &RoomId) -> Result<ParticipantWatch> {
        let mut record = self
            .inner
            .rooms
            .get_mut(room)
            .ok_or_else(|| CallError::RoomNotFound(room.clone()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(record.participants.clone());
        record.watchers.push(tx);
        Ok(ParticipantWatch::new(rx))
    }
}

#[async_trait]
impl SignalingChannel for MemoryBackend {
    async fn publish(&self, message: SignalMessage) -> Result<()> {
        if self.take_injected_failure() {
            return Err(CallError::Backend("injected publish failure".to_owned()));
        }
        self.ensure_room(&message.room)?;

        let copies = if self.inner.duplicate_delivery.load(Ordering::SeqCst) {
            2
        } else {
            1
        };

        let mut mailbox = self.inner.mailboxes.entry(message.room.clone()).or_default();
        debug!(
            "Stored {:?} {} from {:?} to {:?}",
            message.kind(),
            message.id,
            message.from,
            message.to
        );

        mailbox.subscribers.retain(|s| {
            if !s.wants(&message) {
                return true;
            }
            (0..copies).all(|_| s.tx.send(message.clone()).is_ok())
        });
        mailbox.messages.push(message);
        Ok(())
    }

    async fn subscribe(
        &self,
        room: &RoomId,
        recipient: &PeerId,
        kind: SignalKind,
    ) -> Result<SignalSubscription> {
        self.ensure_room(room)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let subscriber = Subscriber {
            recipient: recipient.clone(),
            kind,
            tx,
        };

        let mut mailbox = self.inner.mailboxes.entry(room.clone()).or_default();
        for message in mailbox.messages.iter().filter(|m| subscriber.wants(m)) {
            let _ = subscriber.tx.send(message.clone());
        }
        mailbox.subscribers.push(subscriber);

        Ok(SignalSubscription::new(kind, rx))
    }

    async fn acknowledge(&self, room: &RoomId, id: MessageId) -> Result<()> {
        if let Some(mut mailbox) = self.inner.mailboxes.get_mut(room) {
            mailbox.messages.retain(|m| m.id != id);
        }
        Ok(())
    }

    async fn purge_from(&self, room: &RoomId, sender: &PeerId) -> Result<()> {
        if let Some(mut mailbox) = self.inner.mailboxes.get_mut(room) {
            mailbox.messages.retain(|m| &m.from != sender);
        }
        Ok(())
    }

    async fn purge_between(
        &self,
        room: &RoomId,
        sender: &PeerId,
        recipient: &PeerId,
    ) -> Result<()> {
        if let Some(mut mailbox) = self.inner.mailboxes.get_mut(room) {
            mailbox
                .messages
                .retain(|m| &m.from != sender || &m.to != recipient);
        }
        Ok(())
    }

    async fn purge_to(&self, room: &RoomId, recipient: &PeerId) -> Result<()> {
        if let Some(mut mailbox) = self.inner.mailboxes.get_mut(room) {
            mailbox.messages.retain(|m| &m.to != recipient);
        }
        Ok(())
    }
}
