//! Build cache implementations
//!
//! - [`MemoryBuildCache`]: in-memory, lost on restart
//! - [`FileBuildCache`]: JSON file with atomic writes and backup recovery

pub mod memory;
pub mod file;

pub use memory::MemoryBuildCache;
pub use file::FileBuildCache;
