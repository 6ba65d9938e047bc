pub mod error;
pub mod model;

pub use error::{CallError, Result};
pub use model::*;
