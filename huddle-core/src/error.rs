use crate::model::{PeerId, RoomId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CallError>;

#[derive(Debug, Error)]
pub enum CallError {
    /// Camera or microphone permission was refused. Fatal at call start.
    #[error("media access denied: {0}")]
    MediaAccessDenied(String),

    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    #[error("negotiation with {peer} failed: {reason}")]
    NegotiationFailed { peer: PeerId, reason: String },

    #[error("failed to publish signaling message: {0}")]
    SignalingPublishFailed(String),

    /// The message refers to a peer or round that is no longer tracked.
    #[error("stale message from {peer} (round {round})")]
    StaleMessage { peer: PeerId, round: u32 },

    #[error("call session is closed")]
    SessionClosed,

    #[error("backend error: {0}")]
    Backend(String),
}

impl CallError {
    pub fn negotiation(peer: &PeerId, reason: impl ToString) -> Self {
        Self::NegotiationFailed {
            peer: peer.clone(),
            reason: reason.to_string(),
        }
    }

    /// Only a refused capture device ends a call before it starts.
    pub fn is_call_fatal(&self) -> bool {
        matches!(self, CallError::MediaAccessDenied(_))
    }
}
