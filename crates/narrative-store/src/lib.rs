//! Per-entity record stores: one JSON document per entity on disk, or an
//! in-memory map for dry runs and tests.

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
