//! A byte-buffer toolkit: LZ4 compression, binary diff/patch, and virtual-directory
//! packaging, all built on a single non-owning [`memory_range::MemoryRange`] view and
//! an owning [`buffer::Buffer`] container.

pub mod buffer;
pub mod compress;
pub mod differ;
pub mod directory;
pub mod error;
pub mod memory_range;
pub mod subcommand;
pub mod threader;

pub use buffer::Buffer;
pub use directory::Directory;
pub use error::RangeError;
pub use memory_range::{ByteRange, MemoryRange, ZERO_HASH};
