//! Node store implementations

mod file;
mod memory;

pub use file::FileNodeStore;
pub use memory::MemoryNodeStore;
