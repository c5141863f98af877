//! An owning, growable byte container built on top of [`ByteRange`].
//!
//! Allocates double its logical size on construction and on any resize that outgrows
//! the current capacity, matching the amortized-doubling discipline of the original.

use crate::compress;
use crate::differ;
use crate::error::RangeError;
use crate::memory_range::{ByteRange, MemoryRange};

/// An expandable contiguous byte buffer, similar to a `Vec<u8>` with a capacity that
/// only ever doubles (never shrinks implicitly).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer {
    data: Vec<u8>,
}

impl Buffer {
    /// Construct an empty buffer.
    pub fn empty_buffer() -> Self {
        Self::default()
    }

    /// Construct a buffer of the specified logical size, with capacity `2 * size`.
    pub fn new(size: usize) -> Self {
        let mut data = Vec::with_capacity(size * 2);
        data.resize(size, 0);
        Self { data }
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Ensure capacity is at least `capacity`, without changing logical size.
    pub fn reserve(&mut self, capacity: usize) {
        if capacity > self.data.capacity() {
            self.data.reserve(capacity - self.data.len());
        }
    }

    /// Resize to `size`. Reallocates to capacity `2 * size` when `size` exceeds the
    /// current capacity; otherwise adjusts the logical size in place.
    pub fn resize(&mut self, size: usize) {
        if size > self.data.capacity() {
            let mut new_data = Vec::with_capacity(size * 2);
            new_data.extend_from_slice(&self.data);
            new_data.resize(size, 0);
            self.data = new_data;
        } else {
            self.data.resize(size, 0);
        }
    }

    /// Reallocate so capacity exactly equals the current size.
    pub fn shrink(&mut self) {
        self.data.shrink_to_fit();
    }

    /// Release all memory, setting size and capacity to zero.
    pub fn clear(&mut self) {
        self.data = Vec::new();
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn as_range(&self) -> MemoryRange<'_> {
        MemoryRange::new(&self.data)
    }

    // -- Write side (the portion of the original's MemoryRange API that only ever
    // acts on a Buffer's own backing storage) --

    fn bounds_check(&self, offset: usize, len: usize) -> Result<(), RangeError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(RangeError::OutOfBounds {
                offset,
                len,
                size: self.data.len(),
            }),
        }
    }

    pub fn write_raw(&mut self, offset: usize, src: &[u8]) -> Result<(), RangeError> {
        self.bounds_check(offset, src.len())?;
        self.data[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    pub fn write_u8(&mut self, offset: usize, value: u8) -> Result<(), RangeError> {
        self.write_raw(offset, &[value])
    }

    pub fn write_u64(&mut self, offset: usize, value: u64) -> Result<(), RangeError> {
        self.write_raw(offset, &value.to_le_bytes())
    }

    /// Write a fixed-width, NUL-padded ASCII title field.
    pub fn write_title(&mut self, offset: usize, title: &str, width: usize) -> Result<(), RangeError> {
        debug_assert!(title.len() < width, "title must fit with room for a NUL");
        let mut field = vec![0u8; width];
        field[..title.len()].copy_from_slice(title.as_bytes());
        self.write_raw(offset, &field)
    }

    /// Write a string using the bidirectional `u64 len, bytes, u64 len` framing.
    pub fn write_string(&mut self, offset: usize, s: &str) -> Result<(), RangeError> {
        self.write_u64(offset, s.len() as u64)?;
        self.write_raw(offset + 8, s.as_bytes())?;
        self.write_u64(offset + 8 + s.len(), s.len() as u64)?;
        Ok(())
    }

    // -- Stack-discipline push/pop at the tail --

    pub fn push_raw(&mut self, data: &[u8]) {
        let at = self.data.len();
        self.resize(at + data.len());
        self.write_raw(at, data).expect("just grew to fit");
    }

    pub fn push_u64(&mut self, value: u64) {
        self.push_raw(&value.to_le_bytes());
    }

    pub fn push_title(&mut self, title: &str, width: usize) {
        debug_assert!(title.len() < width, "title must fit with room for a NUL");
        let mut field = vec![0u8; width];
        field[..title.len()].copy_from_slice(title.as_bytes());
        self.push_raw(&field);
    }

    /// Push a string using the bidirectional framing, for tail-first writers.
    pub fn push_string(&mut self, s: &str) {
        self.push_u64(s.len() as u64);
        self.push_raw(s.as_bytes());
        self.push_u64(s.len() as u64);
    }

    pub fn pop_raw(&mut self, len: usize) -> Vec<u8> {
        let at = self.data.len() - len;
        let out = self.data[at..].to_vec();
        self.resize(at);
        out
    }

    pub fn pop_u64(&mut self) -> u64 {
        let bytes = self.pop_raw(8);
        u64::from_le_bytes(bytes.try_into().expect("popped 8 bytes"))
    }

    // -- Derivation methods --

    /// Compress this buffer's contents into a new buffer. `None` on empty input or
    /// compression failure.
    pub fn compress(&self) -> Option<Buffer> {
        compress::compress_range(&self.as_range())
    }

    /// Decompress this buffer's contents into a new buffer. `None` if the header is
    /// missing or mismatched, or decompression fails.
    pub fn decompress(&self) -> Option<Buffer> {
        compress::decompress_range(&self.as_range())
    }

    /// Diff this buffer against `target`, producing a patch instruction set.
    pub fn diff(&self, target: &Buffer) -> Option<Buffer> {
        differ::diff(&self.as_range(), &target.as_range())
    }

    /// Diff two arbitrary byte ranges against each other.
    pub fn diff_ranges(source: &dyn ByteRange, target: &dyn ByteRange) -> Option<Buffer> {
        let source_range = MemoryRange::new(source.as_bytes());
        let target_range = MemoryRange::new(target.as_bytes());
        differ::diff(&source_range, &target_range)
    }

    /// Patch this buffer (as the source) using `diff_buffer`, producing the target.
    pub fn patch(&self, diff_buffer: &Buffer) -> Option<Buffer> {
        differ::patch(&self.as_range(), &diff_buffer.as_range())
    }
}

impl ByteRange for Buffer {
    fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_allocates_double_capacity() {
        let buffer = Buffer::new(1234);
        assert_eq!(buffer.size(), 1234);
        assert_eq!(buffer.capacity(), 2468);
    }

    #[test]
    fn empty_buffer_is_empty() {
        let buffer = Buffer::empty_buffer();
        assert!(buffer.empty());
    }

    #[test]
    fn resize_preserves_existing_bytes() {
        let mut buffer = Buffer::new(4);
        buffer.write_raw(0, &[1, 2, 3, 4]).unwrap();
        buffer.resize(8);
        assert_eq!(&buffer.bytes()[0..4], &[1, 2, 3, 4]);
        assert_eq!(buffer.size(), 8);
    }

    #[test]
    fn shrink_reduces_capacity_to_size() {
        let mut buffer = Buffer::new(16);
        buffer.shrink();
        assert_eq!(buffer.capacity(), buffer.size());
    }

    #[test]
    fn clear_releases_memory() {
        let mut buffer = Buffer::new(64);
        buffer.clear();
        assert!(buffer.empty());
        assert_eq!(buffer.capacity(), 0);
    }

    #[test]
    fn push_u64_grows_tail_and_is_poppable() {
        let mut buffer = Buffer::empty_buffer();
        buffer.push_u64(42);
        assert_eq!(buffer.size(), 8);
        assert_eq!(buffer.pop_u64(), 42);
        assert_eq!(buffer.size(), 0);
    }

    #[test]
    fn push_string_uses_bidirectional_framing() {
        let mut buffer = Buffer::empty_buffer();
        buffer.push_string("hello");
        let (s, next) = buffer.as_range().read_string(0).unwrap();
        assert_eq!(s, "hello");
        assert_eq!(next, buffer.size());
    }

    #[test]
    fn copy_duplicates_bytes() {
        let mut a = Buffer::new(4);
        a.write_raw(0, &[9, 9, 9, 9]).unwrap();
        let b = a.clone();
        assert_eq!(a.bytes(), b.bytes());
    }
}
