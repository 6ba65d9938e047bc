use crate::peer::peer_state::{PeerState, Role};
use huddle_core::IceCandidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferDecision {
    /// Apply it and answer.
    Accept,
    /// Same round, already handled.
    Duplicate,
    /// Older round than ours.
    Stale,
    /// The remote rebuilt its connection; rebuild ours for the new round.
    Restart,
    /// We are the initiator or the link is finished.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateDecision {
    Apply(IceCandidate),
    Queued,
    Stale,
}

/// Held-back candidates per link. A real peer gathers a handful per round.
const MAX_PENDING_CANDIDATES: usize = 64;

/// Offer/answer bookkeeping for one peer connection. No I/O: callers perform
/// the transport work and report back.
#[derive(Debug, Clone)]
pub struct Negotiation {
    role: Role,
    state: PeerState,
    round: u32,
    remote_applied: bool,
    pending: Vec<(u32, IceCandidate)>,
}

impl Negotiation {
    pub fn new(role: Role, round: u32) -> Self {
        let state = match role {
            Role::Initiator => PeerState::New,
            Role::Responder => PeerState::AwaitingOffer,
        };

        Self {
            role,
            state,
            round,
            remote_applied: false,
            pending: Vec::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn has_remote_description(&self) -> bool {
        self.remote_applied
    }

    pub fn queued_candidates(&self) -> usize {
        self.pending.len()
    }

    /// Initiator published its offer.
    pub fn offer_sent(&mut self) -> bool {
        if self.role != Role::Initiator || self.state != PeerState::New {
            return false;
        }
        self.state = PeerState::OfferSent;
        true
    }

    pub fn check_offer(&self, round: u32) -> OfferDecision {
        if self.role != Role::Responder || self.state.is_terminal() {
            return OfferDecision::Reject;
        }
        if round < self.round {
            return OfferDecision::Stale;
        }
        if round > self.round {
            return OfferDecision::Restart;
        }
        if self.state == PeerState::AwaitingOffer {
            OfferDecision::Accept
        } else {
            OfferDecision::Duplicate
        }
    }

    /// Move a responder that has not seen any offer yet to a newer round.
    pub fn adopt_round(&mut self, round: u32) -> bool {
        if self.role != Role::Responder
            || self.state != PeerState::AwaitingOffer
            || self.remote_applied
            || round < self.round
        {
            return false;
        }
        self.round = round;
        self.pending.retain(|(r, _)| *r >= round);
        true
    }

    /// Hand over candidates that belong to rounds this negotiation has not
    /// reached, so a rebuilt negotiation can pick them up.
    pub fn take_future_candidates(&mut self) -> Vec<(u32, IceCandidate)> {
        let round = self.round;
        let (future, current): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.pending).into_iter().partition(|(r, _)| *r > round);
        self.pending = current;
        future
    }

    pub fn restore_candidates(&mut self, candidates: Vec<(u32, IceCandidate)>) {
        let round = self.round;
        self.pending
            .extend(candidates.into_iter().filter(|(r, _)| *r >= round));
    }

    /// Remote offer installed. Returns the candidates that were waiting for it.
    pub fn offer_applied(&mut self) -> Vec<IceCandidate> {
        self.remote_applied = true;
        self.drain_current()
    }

    fn drain_current(&mut self) -> Vec<IceCandidate> {
        let round = self.round;
        let (current, rest): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.pending).into_iter().partition(|(r, _)| *r == round);
        self.pending = rest.into_iter().filter(|(r, _)| *r > round).collect();
        current.into_iter().map(|(_, c)| c).collect()
    }

    pub fn answer_sent(&mut self) -> bool {
        if self.state != PeerState::AwaitingOffer || !self.remote_applied {
            return false;
        }
        self.state = PeerState::AnswerSent;
        true
    }

    pub fn accepts_answer(&self, round: u32) -> bool {
        self.role == Role::Initiator && self.state == PeerState::OfferSent && round == self.round
    }

    /// Remote answer installed. Returns the candidates that were waiting for it.
    pub fn answer_applied(&mut self) -> Vec<IceCandidate> {
        if self.state == PeerState::OfferSent {
            self.state = PeerState::AnswerReceived;
        }
        self.remote_applied = true;
        self.drain_current()
    }

    /// Candidates that arrive before the remote description are held back.
    /// A responder also holds candidates of the next round, since they can
    /// overtake the offer that opens it. The queue is bounded.
    pub fn on_candidate(&mut self, round: u32, candidate: IceCandidate) -> CandidateDecision {
        if self.state.is_terminal() || round < self.round {
            return CandidateDecision::Stale;
        }
        if round > self.round
            && (self.role == Role::Initiator || round > self.round.saturating_add(1))
        {
            return CandidateDecision::Stale;
        }
        if round == self.round && self.remote_applied {
            return CandidateDecision::Apply(candidate);
        }
        if self.pending.len() >= MAX_PENDING_CANDIDATES {
            return CandidateDecision::Stale;
        }
        self.pending.push((round, candidate));
        CandidateDecision::Queued
    }

    /// Transport reached connectivity. Only counts once a remote description
    /// is in place.
    pub fn connected(&mut self) -> bool {
        if !self.remote_applied || self.state.is_terminal() || self.state == PeerState::Connected {
            return false;
        }
        self.state = PeerState::Connected;
        true
    }

    pub fn disconnected(&mut self) -> bool {
        if self.state.is_terminal() || self.state == PeerState::Disconnected {
            return false;
        }
        self.state = PeerState::Disconnected;
        true
    }

    pub fn fail(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = PeerState::Failed;
        self.pending.clear();
        true
    }

    /// Returns `true` only the first time.
    pub fn close(&mut self) -> bool {
        if self.state == PeerState::Closed {
            return false;
        }
        self.state = PeerState::Closed;
        self.pending.clear();
        true
    }
}
