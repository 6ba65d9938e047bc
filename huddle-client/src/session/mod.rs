mod call_client;
mod call_handle;
mod call_session;
mod session_command;
mod session_event;

pub use call_client::*;
pub use call_handle::*;
pub use session_event::*;
