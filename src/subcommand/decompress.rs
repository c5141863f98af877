use crate::buffer::Buffer;
use crate::memory_range::ByteRange;
use eyre::{eyre, Context, Result};
use std::fs;

pub fn run(input: &str, output: &str) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("reading {input}"))?;
    let buffer = Buffer::from_vec(bytes);
    let decompressed = buffer
        .decompress()
        .ok_or_else(|| eyre!("decompression failed (bad header or LZ4 error)"))?;
    fs::write(output, decompressed.bytes()).with_context(|| format!("writing {output}"))?;
    println!("decompressed to {} bytes -> {output}", decompressed.size());
    Ok(())
}
