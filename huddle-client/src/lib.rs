//! Signaling coordinator for mesh video calls.
//!
//! A [`CallClient`] joins a room through a [`RoomDirectory`], exchanges
//! offers, answers and ICE candidates through a [`SignalingChannel`], and keeps
//! one peer connection per remote participant.

mod backend;
mod config;
mod directory;
mod media;
mod peer;
mod session;
mod signaling;
mod transport;

pub use backend::*;
pub use config::*;
pub use directory::*;
pub use media::*;
pub use peer::*;
pub use session::*;
pub use signaling::*;
pub use transport::*;
