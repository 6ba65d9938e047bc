mod memory_backend;

pub use memory_backend::*;
