use anyhow::{Result, bail};
use async_trait::async_trait;
use huddle_client::{
    LinkKey, LocalStream, MediaKind, MediaTransport, RemoteTrackInfo, TransportEvent,
    TransportFactory, TransportState,
};
use huddle_core::{IceCandidate, PeerId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// (local participant, remote participant)
pub type Pair = (PeerId, PeerId);

#[derive(Clone, Copy)]
enum Counter {
    Offers,
    Answers,
    RemoteCandidates,
    Closed,
}

#[derive(Default)]
struct NetworkState {
    created: HashMap<Pair, u32>,
    closed: HashMap<Pair, u32>,
    offers: HashMap<Pair, u32>,
    answers: HashMap<Pair, u32>,
    remote_candidates: HashMap<Pair, u32>,
    remote_offers: HashMap<Pair, Vec<String>>,
    blocked: HashSet<PeerId>,
    live: HashMap<Pair, (LinkKey, mpsc::Sender<TransportEvent>)>,
}

/// In-process stand-in for the network between participants.
///
/// A mock transport reports `Connected` once it has a local description, a
/// remote description and at least one remote candidate. Everything the
/// transports do is counted per pair.
#[derive(Clone, Default)]
pub struct MockNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport factory for the participant `local`.
    pub fn factory(&self, local: &PeerId) -> Arc<dyn TransportFactory> {
        Arc::new(MockTransportFactory {
            local: local.clone(),
            network: self.clone(),
        })
    }

    pub async fn created(&self, local: &PeerId, remote: &PeerId) -> u32 {
        count(&self.state.lock().await.created, local, remote)
    }

    pub async fn closed(&self, local: &PeerId, remote: &PeerId) -> u32 {
        count(&self.state.lock().await.closed, local, remote)
    }

    pub async fn offers(&self, local: &PeerId, remote: &PeerId) -> u32 {
        count(&self.state.lock().await.offers, local, remote)
    }

    pub async fn answers(&self, local: &PeerId, remote: &PeerId) -> u32 {
        count(&self.state.lock().await.answers, local, remote)
    }

    pub async fn remote_candidates(&self, local: &PeerId, remote: &PeerId) -> u32 {
        count(&self.state.lock().await.remote_candidates, local, remote)
    }

    /// Offer descriptions `local` applied from `remote`, oldest first.
    pub async fn remote_offers(&self, local: &PeerId, remote: &PeerId) -> Vec<String> {
        self.state
            .lock()
            .await
            .remote_offers
            .get(&(local.clone(), remote.clone()))
            .cloned()
            .unwrap_or_default()
    }

    /// Transports touching `peer` never connect from now on.
    pub async fn block(&self, peer: &PeerId) {
        self.state.lock().await.blocked.insert(peer.clone());
    }

    /// Make the newest transport of `local` towards `remote` report a drop.
    pub async fn disconnect(&self, local: &PeerId, remote: &PeerId) {
        let live = self
            .state
            .lock()
            .await
            .live
            .get(&(local.clone(), remote.clone()))
            .cloned();

        if let Some((key, events)) = live {
            tracing::debug!("[MockNetwork] Dropping link {:?} of {:?}", key, local);
            let _ = events
                .send(TransportEvent::StateChanged(key, TransportState::Disconnected))
                .await;
        }
    }

    async fn is_blocked(&self, local: &PeerId, remote: &PeerId) -> bool {
        let state = self.state.lock().await;
        state.blocked.contains(local) || state.blocked.contains(remote)
    }

    async fn bump(&self, counter: Counter, pair: Pair) {
        let mut state = self.state.lock().await;
        let map = match counter {
            Counter::Offers => &mut state.offers,
            Counter::Answers => &mut state.answers,
            Counter::RemoteCandidates => &mut state.remote_candidates,
            Counter::Closed => &mut state.closed,
        };
        *map.entry(pair).or_insert(0) += 1;
    }
}

fn count(map: &HashMap<Pair, u32>, local: &PeerId, remote: &PeerId) -> u32 {
    map.get(&(local.clone(), remote.clone())).copied().unwrap_or(0)
}

struct MockTransportFactory {
    local: PeerId,
    network: MockNetwork,
}

#[async_trait]
impl TransportFactory for MockTransportFactory {
    async fn create(
        &self,
        key: LinkKey,
        _stream: Arc<LocalStream>,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn MediaTransport>> {
        let pair = (self.local.clone(), key.peer_id.clone());
        {
            let mut state = self.network.state.lock().await;
            *state.created.entry(pair.clone()).or_insert(0) += 1;
            state
                .live
                .insert(pair.clone(), (key.clone(), events.clone()));
        }

        Ok(Box::new(MockTransport {
            pair,
            key,
            events,
            network: self.network.clone(),
            link: Mutex::new(LinkProgress::default()),
        }))
    }
}

#[derive(Default)]
struct LinkProgress {
    local_set: bool,
    remote_set: bool,
    remote_candidate: bool,
    connected: bool,
    closed: bool,
}

struct MockTransport {
    pair: Pair,
    key: LinkKey,
    events: mpsc::Sender<TransportEvent>,
    network: MockNetwork,
    link: Mutex<LinkProgress>,
}

impl MockTransport {
    fn describe(&self, kind: &str) -> String {
        format!(
            "v=0 mock-{} {}->{} gen {}",
            kind, self.pair.0, self.pair.1, self.key.generation
        )
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.events.try_send(event);
    }

    async fn local_description_set(&self) {
        self.link.lock().await.local_set = true;
        self.emit(TransportEvent::CandidateGenerated(
            self.key.clone(),
            IceCandidate::new(format!(
                "candidate:1 1 udp 2130706431 127.0.0.1 {} typ host",
                50_000 + self.key.generation
            )),
        ));
        self.try_connect().await;
    }

    async fn try_connect(&self) {
        if self.network.is_blocked(&self.pair.0, &self.pair.1).await {
            return;
        }

        let mut link = self.link.lock().await;
        if link.closed || link.connected {
            return;
        }
        if !(link.local_set && link.remote_set && link.remote_candidate) {
            return;
        }
        link.connected = true;

        self.emit(TransportEvent::RemoteTrack(
            self.key.clone(),
            RemoteTrackInfo {
                kind: MediaKind::Video,
                track_id: format!("video-{}", self.pair.1),
                stream_id: format!("stream-{}", self.pair.1),
            },
        ));
        self.emit(TransportEvent::StateChanged(
            self.key.clone(),
            TransportState::Connected,
        ));
    }
}

#[async_trait]
impl MediaTransport for MockTransport {
    async fn create_offer(&self) -> Result<String> {
        self.network
            .bump(Counter::Offers, self.pair.clone())
            .await;
        let sdp = self.describe("offer");
        self.local_description_set().await;
        Ok(sdp)
    }

    async fn create_answer(&self) -> Result<String> {
        if !self.link.lock().await.remote_set {
            bail!("cannot answer without a remote offer");
        }
        self.network
            .bump(Counter::Answers, self.pair.clone())
            .await;
        let sdp = self.describe("answer");
        self.local_description_set().await;
        Ok(sdp)
    }

    async fn set_remote_offer(&self, sdp: String) -> Result<()> {
        if !sdp.contains("mock-offer") {
            bail!("not an offer: {sdp}");
        }
        self.link.lock().await.remote_set = true;
        self.network
            .state
            .lock()
            .await
            .remote_offers
            .entry(self.pair.clone())
            .or_default()
            .push(sdp);
        Ok(())
    }

    async fn set_remote_answer(&self, sdp: String) -> Result<()> {
        if !sdp.contains("mock-answer") {
            bail!("not an answer: {sdp}");
        }
        self.link.lock().await.remote_set = true;
        self.try_connect().await;
        Ok(())
    }

    async fn add_ice_candidate(&self, _candidate: IceCandidate) -> Result<()> {
        {
            let mut link = self.link.lock().await;
            // Same rule a real peer connection enforces.
            if !link.remote_set {
                bail!("remote description is not set");
            }
            link.remote_candidate = true;
        }
        self.network
            .bump(Counter::RemoteCandidates, self.pair.clone())
            .await;
        self.try_connect().await;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.link.lock().await.closed = true;
        self.network
            .bump(Counter::Closed, self.pair.clone())
            .await;
        Ok(())
    }
}
