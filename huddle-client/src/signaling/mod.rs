mod publisher;
mod signal_inbox;
mod signaling_channel;

pub use publisher::*;
pub use signal_inbox::*;
pub use signaling_channel::*;
