mod negotiation;
mod peer_link;
mod peer_manager;
mod peer_state;

pub use negotiation::*;
pub use peer_link::*;
pub(crate) use peer_manager::{ManagerInput, PeerManager};
pub use peer_state::*;
