//! LZ4-backed compression of a [`ByteRange`] into a self-describing [`Buffer`].
//!
//! The 16-byte title + `u64` uncompressed-size header is written and read by hand
//! rather than via `lz4_flex`'s own frame format, so the on-wire layout matches §6 of
//! the container format table exactly.

use crate::buffer::Buffer;
use crate::memory_range::ByteRange;

const TITLE: &str = "yatta compress";
const TITLE_WIDTH: usize = 16;
const HEADER_SIZE: usize = TITLE_WIDTH + 8;

/// Compress `range`'s contents, prefixed with the compression header.
/// Returns `None` on empty input or LZ4 failure.
pub fn compress_range(range: &dyn ByteRange) -> Option<Buffer> {
    if range.empty() {
        return None;
    }

    let source = range.as_bytes();
    let source_size = source.len();
    let destination_size = source_size * 2;

    let mut buffer = Buffer::new(HEADER_SIZE + destination_size);
    buffer.write_title(0, TITLE, TITLE_WIDTH).ok()?;
    buffer.write_u64(TITLE_WIDTH, source_size as u64).ok()?;

    let compressed_size =
        lz4_flex::block::compress_into(source, &mut buffer.bytes_mut()[HEADER_SIZE..]).ok()?;

    if compressed_size == 0 {
        return None;
    }

    buffer.resize(HEADER_SIZE + compressed_size);
    buffer.shrink();
    tracing::trace!(source_size, compressed_size, "compressed buffer");
    Some(buffer)
}

/// Decompress a buffer written by [`compress_range`]. Returns `None` if the header
/// title doesn't match or LZ4 decompression fails.
pub fn decompress_range(range: &dyn ByteRange) -> Option<Buffer> {
    if range.size() < HEADER_SIZE {
        return None;
    }

    let title = range.read_title(0, TITLE_WIDTH).ok()?;
    if title != TITLE {
        return None;
    }
    let uncompressed_size = range.read_u64(TITLE_WIDTH).ok()? as usize;

    let mut out = Buffer::new(uncompressed_size);
    let payload = &range.as_bytes()[HEADER_SIZE..];
    let written = lz4_flex::block::decompress_into(payload, out.bytes_mut()).ok()?;

    if written == 0 && uncompressed_size != 0 {
        return None;
    }
    tracing::trace!(uncompressed_size, "decompressed buffer");
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_range::MemoryRange;

    #[test]
    fn round_trip_preserves_bytes() {
        let data = b"the quick brown fox jumps over the lazy dog, repeatedly, repeatedly, repeatedly";
        let range = MemoryRange::new(data);
        let compressed = compress_range(&range).expect("compress");
        let decompressed = decompress_range(&compressed).expect("decompress");
        assert_eq!(decompressed.bytes(), data);
    }

    #[test]
    fn compress_empty_yields_none() {
        let range = MemoryRange::new(&[]);
        assert!(compress_range(&range).is_none());
    }

    #[test]
    fn decompress_without_header_yields_none() {
        let garbage = vec![1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        let range = MemoryRange::new(&garbage);
        assert!(decompress_range(&range).is_none());
    }

    #[test]
    fn seed_scenario_256_byte_payload_round_trips() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1234i32.to_le_bytes());
        payload.extend_from_slice(&567.890f32.to_le_bytes());
        let mut name = [0u8; 248];
        let text = b"QWE NOUNOU QWE NOUNOU QWE NOUNOU";
        name[..text.len()].copy_from_slice(text);
        payload.extend_from_slice(&name);

        let range = MemoryRange::new(&payload);
        let compressed = compress_range(&range).expect("compress");
        let decompressed = decompress_range(&compressed).expect("decompress");
        assert_eq!(decompressed.bytes(), payload.as_slice());
    }
}
