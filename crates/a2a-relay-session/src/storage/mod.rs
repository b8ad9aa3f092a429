//! Storage implementations.

pub mod file;

#[cfg(feature = "memory")]
pub mod memory;

pub use file::JsonFileStore;

#[cfg(feature = "memory")]
pub use memory::MemoryStore;
