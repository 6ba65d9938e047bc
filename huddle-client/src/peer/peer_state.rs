use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side sends the offer. Decided once per pair so both peers never
/// offer at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Initiator,
    Responder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerState {
    New,
    OfferSent,
    AwaitingOffer,
    AnswerSent,
    AnswerReceived,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl PeerState {
    /// No further transitions happen from these states.
    pub fn is_terminal(self) -> bool {
        matches!(self, PeerState::Failed | PeerState::Closed)
    }
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
