mod ice;
mod peer;
mod room;
mod signaling;

pub use ice::{IceCandidate, IceServerConfig};
pub use peer::PeerId;
pub use room::{Participants, RoomId};
pub use signaling::{MessageId, SignalKind, SignalMessage, SignalPayload};
