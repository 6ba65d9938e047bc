use crate::model::peer::PeerId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Membership snapshot of a room.
///
/// Members are unique. They are kept in the order they joined, which gives
/// every participant the same view of who arrived first.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Participants(Vec<PeerId>);

impl Participants {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Adds `peer_id` unless already present. Returns `true` if it was added.
    pub fn insert(&mut self, peer_id: PeerId) -> bool {
        if self.0.contains(&peer_id) {
            return false;
        }
        self.0.push(peer_id);
        true
    }

    /// Returns `true` if `peer_id` was a member.
    pub fn remove(&mut self, peer_id: &PeerId) -> bool {
        let before = self.0.len();
        self.0.retain(|p| p != peer_id);
        before != self.0.len()
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.0.contains(peer_id)
    }

    /// Join position of `peer_id`, 0 for the first member.
    pub fn position(&self, peer_id: &PeerId) -> Option<usize> {
        self.0.iter().position(|p| p == peer_id)
    }

    /// Returns `true` if `a` joined before `b`. Unknown members sort last.
    pub fn joined_before(&self, a: &PeerId, b: &PeerId) -> bool {
        match (self.position(a), self.position(b)) {
            (Some(x), Some(y)) => x < y,
            (Some(_), None) => true,
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<PeerId> for Participants {
    fn from_iter<I: IntoIterator<Item = PeerId>>(iter: I) -> Self {
        let mut participants = Participants::new();
        for peer_id in iter {
            participants.insert(peer_id);
        }
        participants
    }
}
