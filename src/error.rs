use thiserror::Error;

/// Errors surfaced by bounds-checked operations on a [`crate::memory_range::MemoryRange`]
/// or [`crate::buffer::Buffer`].
///
/// These are the only errors the core raises on its own; format mismatches
/// (bad headers, failed (de)compression) are reported as `None` rather than
/// as an error, per the original library's contract.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("memory range index out of bounds (offset {offset}, len {len}, range size {size})")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },
}
