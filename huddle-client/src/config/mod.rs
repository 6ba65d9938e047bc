mod call_config;
mod media_constraints;

pub use call_config::*;
pub use media_constraints::*;
