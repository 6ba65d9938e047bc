use crate::peer::negotiation::Negotiation;
use crate::peer::peer_state::{PeerState, Role};
use crate::transport::{LinkKey, MediaTransport};
use huddle_core::PeerId;
use serde::Serialize;
use tracing::warn;

/// Point-in-time view of one tracked peer connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerStatus {
    pub peer_id: PeerId,
    pub role: Role,
    pub state: PeerState,
    pub round: u32,
    pub generation: u64,
    pub retries: u32,
}

/// Connection to one remote participant: negotiation state plus the
/// transport currently carrying it.
pub struct PeerLink {
    key: LinkKey,
    pub(crate) negotiation: Negotiation,
    pub(crate) retries: u32,
    transport: Option<Box<dyn MediaTransport>>,
}

impl PeerLink {
    pub(crate) fn new(
        key: LinkKey,
        negotiation: Negotiation,
        retries: u32,
        transport: Option<Box<dyn MediaTransport>>,
    ) -> Self {
        Self {
            key,
            negotiation,
            retries,
            transport,
        }
    }

    pub fn key(&self) -> &LinkKey {
        &self.key
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.key.peer_id
    }

    pub fn generation(&self) -> u64 {
        self.key.generation
    }

    pub fn state(&self) -> PeerState {
        self.negotiation.state()
    }

    pub fn role(&self) -> Role {
        self.negotiation.role()
    }

    pub fn round(&self) -> u32 {
        self.negotiation.round()
    }

    pub(crate) fn transport(&self) -> Option<&dyn MediaTransport> {
        self.transport.as_deref()
    }

    /// Close the transport. Only the first call reaches it.
    pub(crate) async fn shutdown(&mut self) -> bool {
        let Some(transport) = self.transport.take() else {
            return false;
        };
        if let Err(e) = transport.close().await {
            warn!("Failed to close connection to {:?}: {:?}", self.key.peer_id, e);
        }
        true
    }

    pub fn status(&self) -> PeerStatus {
        PeerStatus {
            peer_id: self.key.peer_id.clone(),
            role: self.role(),
            state: self.state(),
            round: self.round(),
            generation: self.key.generation,
            retries: self.retries,
        }
    }
}
