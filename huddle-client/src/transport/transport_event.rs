use crate::media::MediaKind;
use huddle_core::{IceCandidate, PeerId};

/// Identifies one incarnation of the connection to a remote participant.
/// A rebuilt connection gets a new generation, so events from the old one
/// can be told apart and dropped.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct LinkKey {
    pub peer_id: PeerId,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrackInfo {
    pub kind: MediaKind,
    pub track_id: String,
    pub stream_id: String,
}

/// События, которые транспорт генерирует для сессии звонка.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Сгенерирован локальный ICE-кандидат, его нужно отправить собеседнику.
    CandidateGenerated(LinkKey, IceCandidate),

    StateChanged(LinkKey, TransportState),

    /// Собеседник прислал аудио или видео дорожку.
    RemoteTrack(LinkKey, RemoteTrackInfo),
}

impl TransportEvent {
    pub fn key(&self) -> &LinkKey {
        match self {
            TransportEvent::CandidateGenerated(key, _)
            | TransportEvent::StateChanged(key, _)
            | TransportEvent::RemoteTrack(key, _) => key,
        }
    }
}
