use crate::signaling::signaling_channel::{SignalSubscription, SignalingChannel};
use huddle_core::{MessageId, PeerId, Result, RoomId, SignalKind, SignalMessage};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};

/// Redeliveries arrive close to the original, so only this many recent ids
/// are remembered.
const SEEN_CAPACITY: usize = 1024;

/// Merges the offer, answer and candidate feeds of one participant and
/// filters out redeliveries.
pub struct SignalInbox {
    owner: PeerId,
    offers: Option<SignalSubscription>,
    answers: Option<SignalSubscription>,
    candidates: Option<SignalSubscription>,
    seen: HashSet<MessageId>,
    order: VecDeque<MessageId>,
    capacity: usize,
}

impl SignalInbox {
    pub async fn open(
        channel: &dyn SignalingChannel,
        room: &RoomId,
        owner: &PeerId,
    ) -> Result<Self> {
        let offers = channel.subscribe(room, owner, SignalKind::Offer).await?;
        let answers = channel.subscribe(room, owner, SignalKind::Answer).await?;
        let candidates = channel.subscribe(room, owner, SignalKind::Candidate).await?;

        Ok(Self {
            owner: owner.clone(),
            offers: Some(offers),
            answers: Some(answers),
            candidates: Some(candidates),
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity: SEEN_CAPACITY,
        })
    }

    /// Next message not seen before in this session. `None` once every feed
    /// has closed.
    pub async fn recv(&mut self) -> Option<SignalMessage> {
        loop {
            let message = self.recv_any().await?;

            if message.to != self.owner {
                warn!(
                    "Dropping message {} addressed to {:?}, not {:?}",
                    message.id, message.to, self.owner
                );
                continue;
            }

            if !self.remember(message.id) {
                debug!("Dropping redelivered message {}", message.id);
                continue;
            }

            return Some(message);
        }
    }

    fn remember(&mut self, id: MessageId) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    async fn recv_any(&mut self) -> Option<SignalMessage> {
        loop {
            if self.offers.is_none() && self.answers.is_none() && self.candidates.is_none() {
                return None;
            }

            tokio::select! {
                msg = recv_from(&mut self.offers) => match msg {
                    Some(m) => return Some(m),
                    None => self.offers = None,
                },
                msg = recv_from(&mut self.answers) => match msg {
                    Some(m) => return Some(m),
                    None => self.answers = None,
                },
                msg = recv_from(&mut self.candidates) => match msg {
                    Some(m) => return Some(m),
                    None => self.candidates = None,
                },
            }
        }
    }
}

async fn recv_from(sub: &mut Option<SignalSubscription>) -> Option<SignalMessage> {
    match sub {
        Some(s) => s.recv().await,
        None => std::future::pending().await,
    }
}
