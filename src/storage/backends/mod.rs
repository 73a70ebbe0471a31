//! Storage backend implementations.

mod file;
mod memory;

pub use file::JsonlStore;
pub use memory::MemoryStore;
