use crate::config::CallConfig;
use crate::media::LocalStream;
use crate::peer::negotiation::{CandidateDecision, Negotiation, OfferDecision};
use crate::peer::peer_link::{PeerLink, PeerStatus};
use crate::peer::peer_state::{PeerState, Role};
use crate::session::SessionEvent;
use crate::signaling::Publisher;
use crate::transport::{LinkKey, TransportEvent, TransportFactory, TransportState};
use huddle_core::{CallError, IceCandidate, PeerId, RoomId, SignalMessage, SignalPayload};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TimerEvent {
    Reconnect(LinkKey),
    NegotiationTimeout(LinkKey),
}

/// Work produced by the links themselves rather than by the room.
#[derive(Debug)]
pub(crate) enum ManagerInput {
    Transport(TransportEvent),
    Timer(TimerEvent),
}

/// Owns every peer connection of one call session, at most one per remote
/// participant.
pub(crate) struct PeerManager {
    self_id: PeerId,
    room: RoomId,
    config: CallConfig,
    links: HashMap<PeerId, PeerLink>,
    next_generation: u64,
    publisher: Publisher,
    transports: Arc<dyn TransportFactory>,
    stream: Arc<LocalStream>,
    transport_tx: mpsc::Sender<TransportEvent>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    timer_tx: mpsc::UnboundedSender<TimerEvent>,
    timer_rx: mpsc::UnboundedReceiver<TimerEvent>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl PeerManager {
    pub(crate) fn new(
        self_id: PeerId,
        room: RoomId,
        config: CallConfig,
        publisher: Publisher,
        transports: Arc<dyn TransportFactory>,
        stream: Arc<LocalStream>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let (transport_tx, transport_rx) = mpsc::channel(256);
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();

        Self {
            self_id,
            room,
            config,
            links: HashMap::new(),
            next_generation: 0,
            publisher,
            transports,
            stream,
            transport_tx,
            transport_rx,
            timer_tx,
            timer_rx,
            events,
        }
    }

    pub(crate) fn contains(&self, peer_id: &PeerId) -> bool {
        self.links.contains_key(peer_id)
    }

    pub(crate) fn tracked(&self) -> Vec<PeerId> {
        self.links.keys().cloned().collect()
    }

    pub(crate) fn statuses(&self) -> Vec<PeerStatus> {
        let mut statuses: Vec<_> = self.links.values().map(PeerLink::status).collect();
        statuses.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        statuses
    }

    pub(crate) async fn next_input(&mut self) -> ManagerInput {
        // Both senders live in `self`, so neither channel closes.
        tokio::select! {
            Some(event) = self.transport_rx.recv() => ManagerInput::Transport(event),
            Some(timer) = self.timer_rx.recv() => ManagerInput::Timer(timer),
            else => std::future::pending().await,
        }
    }

    pub(crate) async fn handle_input(&mut self, input: ManagerInput) {
        match input {
            ManagerInput::Transport(event) => self.handle_transport_event(event).await,
            ManagerInput::Timer(timer) => self.handle_timer(timer).await,
        }
    }

    /// Start a connection to a newly discovered participant.
    pub(crate) async fn open(&mut self, peer_id: PeerId, role: Role) {
        if self.links.contains_key(&peer_id) {
            return;
        }
        info!("Opening link to {:?} as {:?}", peer_id, role);
        self.connect(peer_id, Negotiation::new(role, 0), 0).await;
    }

    /// Tear down the link to `peer_id`. Returns `false` if it was not tracked.
    pub(crate) async fn close(&mut self, peer_id: &PeerId) -> bool {
        let Some(mut link) = self.links.remove(peer_id) else {
            return false;
        };

        link.negotiation.close();
        link.shutdown().await;
        info!("Closed link to {:?}", peer_id);

        // A later link to the same participant must not find these.
        if let Err(e) = self
            .publisher
            .withdraw(&self.room, &self.self_id, peer_id)
            .await
        {
            warn!("Failed to delete records for {:?}: {}", peer_id, e);
        }

        let _ = self.events.send(SessionEvent::PeerStateChanged {
            peer_id: peer_id.clone(),
            state: PeerState::Closed,
        });
        true
    }

    pub(crate) async fn close_all(&mut self) {
        for peer_id in self.tracked() {
            self.close(&peer_id).await;
        }
    }

    pub(crate) async fn handle_signal(&mut self, message: SignalMessage) {
        let SignalMessage {
            from,
            round,
            payload,
            ..
        } = message;

        if !self.links.contains_key(&from) {
            debug!("{}", CallError::StaleMessage { peer: from, round });
            return;
        }

        match payload {
            SignalPayload::Offer { sdp } => self.handle_offer(&from, round, sdp).await,
            SignalPayload::Answer { sdp } => self.handle_answer(&from, round, sdp).await,
            SignalPayload::Candidate(candidate) => {
                self.handle_candidate(&from, round, candidate).await
            }
        }
    }

    async fn connect(&mut self, peer_id: PeerId, negotiation: Negotiation, retries: u32) {
        self.next_generation += 1;
        let key = LinkKey {
            peer_id: peer_id.clone(),
            generation: self.next_generation,
        };
        let role = negotiation.role();

        let transport = match self
            .transports
            .create(key.clone(), Arc::clone(&self.stream), self.transport_tx.clone())
            .await
        {
            Ok(transport) => Some(transport),
            Err(e) => {
                error!("Failed to create transport for {:?}: {:?}", peer_id, e);
                None
            }
        };
        let created = transport.is_some();

        self.links.insert(
            peer_id.clone(),
            PeerLink::new(key.clone(), negotiation, retries, transport),
        );
        self.emit_state(&peer_id);

        if !created {
            self.negotiation_failed(&peer_id, "transport could not be created")
                .await;
            return;
        }

        let timeout = self.config.negotiation_timeout();
        if !timeout.is_zero() {
            self.arm(TimerEvent::NegotiationTimeout(key), timeout);
        }

        if role == Role::Initiator {
            self.send_offer(&peer_id).await;
        }
    }

    async fn send_offer(&mut self, peer_id: &PeerId) {
        let (offer, round) = {
            let Some(link) = self.links.get(peer_id) else {
                return;
            };
            let Some(transport) = link.transport() else {
                return;
            };
            (transport.create_offer().await, link.round())
        };

        let sdp = match offer {
            Ok(sdp) => sdp,
            Err(e) => {
                self.negotiation_failed(peer_id, format!("create offer: {e}"))
                    .await;
                return;
            }
        };

        if let Err(e) = self
            .publish(peer_id, round, SignalPayload::Offer { sdp })
            .await
        {
            self.negotiation_failed(peer_id, e).await;
            return;
        }

        let sent = self
            .links
            .get_mut(peer_id)
            .is_some_and(|link| link.negotiation.offer_sent());
        if sent {
            self.emit_state(peer_id);
        }
    }

    async fn handle_offer(&mut self, from: &PeerId, round: u32, sdp: String) {
        let Some(link) = self.links.get_mut(from) else {
            return;
        };

        match link.negotiation.check_offer(round) {
            OfferDecision::Accept => {}
            OfferDecision::Restart => {
                if link.negotiation.adopt_round(round) {
                    debug!("{:?} moved to round {} before we saw an offer", from, round);
                } else {
                    info!("{:?} rebuilt its connection (round {}), following", from, round);
                    self.rebuild(from, Some(round)).await;
                }
            }
            OfferDecision::Duplicate => {
                debug!("Ignoring duplicate offer from {:?} (round {})", from, round);
                return;
            }
            OfferDecision::Stale => {
                debug!("Ignoring offer from {:?} for old round {}", from, round);
                return;
            }
            OfferDecision::Reject => {
                warn!(
                    "Ignoring offer from {:?}: link is {:?} as {:?}",
                    from,
                    link.state(),
                    link.role()
                );
                return;
            }
        }

        self.answer(from, sdp).await;
    }

    async fn answer(&mut self, from: &PeerId, sdp: String) {
        let applied = {
            let Some(link) = self.links.get(from) else {
                return;
            };
            if link.state() != PeerState::AwaitingOffer {
                return;
            }
            let Some(transport) = link.transport() else {
                return;
            };
            transport.set_remote_offer(sdp).await
        };
        if let Err(e) = applied {
            self.negotiation_failed(from, format!("apply offer: {e}"))
                .await;
            return;
        }

        let (queued, round) = match self.links.get_mut(from) {
            Some(link) => (link.negotiation.offer_applied(), link.round()),
            None => return,
        };
        self.apply_candidates(from, queued).await;

        let answer = {
            let Some(transport) = self.links.get(from).and_then(|l| l.transport()) else {
                return;
            };
            transport.create_answer().await
        };
        let sdp = match answer {
            Ok(sdp) => sdp,
            Err(e) => {
                self.negotiation_failed(from, format!("create answer: {e}"))
                    .await;
                return;
            }
        };

        if let Err(e) = self
            .publish(from, round, SignalPayload::Answer { sdp })
            .await
        {
            self.negotiation_failed(from, e).await;
            return;
        }

        let sent = self
            .links
            .get_mut(from)
            .is_some_and(|link| link.negotiation.answer_sent());
        if sent {
            self.emit_state(from);
        }
    }

    async fn handle_answer(&mut self, from: &PeerId, round: u32, sdp: String) {
        let applied = {
            let Some(link) = self.links.get(from) else {
                return;
            };
            if !link.negotiation.accepts_answer(round) {
                debug!(
                    "Ignoring answer from {:?} (round {}, link {:?} in round {})",
                    from,
                    round,
                    link.state(),
                    link.round()
                );
                return;
            }
            let Some(transport) = link.transport() else {
                return;
            };
            transport.set_remote_answer(sdp).await
        };
        if let Err(e) = applied {
            self.negotiation_failed(from, format!("apply answer: {e}"))
                .await;
            return;
        }

        let queued = match self.links.get_mut(from) {
            Some(link) => link.negotiation.answer_applied(),
            None => return,
        };
        self.emit_state(from);
        self.apply_candidates(from, queued).await;
    }

    async fn handle_candidate(&mut self, from: &PeerId, round: u32, candidate: IceCandidate) {
        let Some(link) = self.links.get_mut(from) else {
            return;
        };

        match link.negotiation.on_candidate(round, candidate) {
            CandidateDecision::Apply(candidate) => {
                self.apply_candidates(from, vec![candidate]).await
            }
            CandidateDecision::Queued => {
                debug!("Queued candidate from {:?} until its description arrives", from)
            }
            CandidateDecision::Stale => {
                debug!("Dropping candidate from {:?} for round {}", from, round)
            }
        }
    }

    async fn apply_candidates(&self, peer_id: &PeerId, candidates: Vec<IceCandidate>) {
        let Some(transport) = self.links.get(peer_id).and_then(|l| l.transport()) else {
            return;
        };
        for candidate in candidates {
            if let Err(e) = transport.add_ice_candidate(candidate).await {
                warn!("Failed to add ICE candidate for {:?}: {:?}", peer_id, e);
            }
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        let current = self
            .links
            .get(&event.key().peer_id)
            .map(PeerLink::generation);
        if current != Some(event.key().generation) {
            debug!("Dropping event from retired connection {:?}", event.key());
            return;
        }

        match event {
            TransportEvent::CandidateGenerated(key, candidate) => {
                let Some(round) = self.links.get(&key.peer_id).map(PeerLink::round) else {
                    return;
                };
                if let Err(e) = self
                    .publish(&key.peer_id, round, SignalPayload::Candidate(candidate))
                    .await
                {
                    warn!("Lost local candidate for {:?}: {}", key.peer_id, e);
                }
            }

            TransportEvent::StateChanged(key, state) => match state {
                TransportState::Connected => self.connected(&key.peer_id),
                TransportState::Disconnected | TransportState::Failed => {
                    warn!("Transport to {:?} reported {:?}", key.peer_id, state);
                    self.connection_lost(&key.peer_id).await;
                }
                TransportState::Connecting | TransportState::Closed => {}
            },

            TransportEvent::RemoteTrack(key, track) => {
                let _ = self.events.send(SessionEvent::RemoteTrack {
                    peer_id: key.peer_id,
                    track,
                });
            }
        }
    }

    async fn handle_timer(&mut self, timer: TimerEvent) {
        match timer {
            TimerEvent::Reconnect(key) => {
                let Some(link) = self.links.get(&key.peer_id) else {
                    return;
                };
                if link.generation() != key.generation || link.state() != PeerState::Disconnected {
                    return;
                }
                self.rebuild(&key.peer_id, None).await;
            }

            TimerEvent::NegotiationTimeout(key) => {
                let Some(link) = self.links.get(&key.peer_id) else {
                    return;
                };
                if link.generation() != key.generation {
                    return;
                }
                match link.state() {
                    PeerState::Connected
                    | PeerState::Disconnected
                    | PeerState::Failed
                    | PeerState::Closed => {}
                    state => {
                        let reason = format!(
                            "not connected after {:?} (still {})",
                            self.config.negotiation_timeout(),
                            state
                        );
                        self.negotiation_failed(&key.peer_id, reason).await;
                    }
                }
            }
        }
    }

    fn connected(&mut self, peer_id: &PeerId) {
        let Some(link) = self.links.get_mut(peer_id) else {
            return;
        };
        if !link.negotiation.connected() {
            return;
        }
        link.retries = 0;
        info!("Connected to {:?}", peer_id);
        self.emit_state(peer_id);
    }

    async fn negotiation_failed(&mut self, peer_id: &PeerId, reason: impl Display) {
        warn!("{}", CallError::negotiation(peer_id, reason));
        self.connection_lost(peer_id).await;
    }

    /// Schedule the rebuild if the retry budget allows it, otherwise give up
    /// on this participant.
    async fn connection_lost(&mut self, peer_id: &PeerId) {
        let max = self.config.max_reconnect_attempts;
        let delay = self.config.reconnect_delay();

        let Some(link) = self.links.get_mut(peer_id) else {
            return;
        };
        let state = link.state();
        if state.is_terminal() || state == PeerState::Disconnected {
            return;
        }

        if link.retries < max {
            link.negotiation.disconnected();
            let key = link.key().clone();
            info!(
                "Link to {:?} lost, rebuilding in {:?} (attempt {}/{})",
                peer_id,
                delay,
                link.retries + 1,
                max
            );
            self.arm(TimerEvent::Reconnect(key), delay);
        } else {
            link.negotiation.fail();
            link.shutdown().await;
            error!("Link to {:?} failed after {} retries", peer_id, link.retries);
        }
        self.emit_state(peer_id);
    }

    /// Replace the link's transport with a fresh one. `remote_round` is set
    /// when the remote side already rebuilt and told us its new round.
    async fn rebuild(&mut self, peer_id: &PeerId, remote_round: Option<u32>) {
        let Some(mut old) = self.links.remove(peer_id) else {
            return;
        };
        old.shutdown().await;

        let role = old.role();
        let was_down = old.state() == PeerState::Disconnected;
        let (round, retries) = match remote_round {
            Some(round) => (round, old.retries + u32::from(was_down)),
            None => {
                let round = match role {
                    Role::Initiator => old.round() + 1,
                    Role::Responder => old.round(),
                };
                (round, old.retries + 1)
            }
        };

        let mut negotiation = Negotiation::new(role, round);
        negotiation.restore_candidates(old.negotiation.take_future_candidates());

        info!(
            "Rebuilding link to {:?} as {:?} (round {}, retry {})",
            peer_id, role, round, retries
        );
        self.connect(peer_id.clone(), negotiation, retries).await;
    }

    async fn publish(&self, to: &PeerId, round: u32, payload: SignalPayload) -> huddle_core::Result<()> {
        let message = SignalMessage::new(
            self.room.clone(),
            self.self_id.clone(),
            to.clone(),
            round,
            payload,
        );
        self.publisher.publish(message).await
    }

    fn emit_state(&self, peer_id: &PeerId) {
        if let Some(link) = self.links.get(peer_id) {
            let _ = self.events.send(SessionEvent::PeerStateChanged {
                peer_id: peer_id.clone(),
                state: link.state(),
            });
        }
    }

    fn arm(&self, timer: TimerEvent, after: Duration) {
        let tx = self.timer_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(timer);
        });
    }
}
