pub use huddle_core::model::{PeerId, RoomId};
pub use huddle_core::{CallError, Result};

pub mod model {
    pub use huddle_core::model::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use huddle_client::*;
}
