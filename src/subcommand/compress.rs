use crate::buffer::Buffer;
use crate::memory_range::ByteRange;
use eyre::{eyre, Context, Result};
use std::fs;

pub fn run(input: &str, output: &str) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("reading {input}"))?;
    let buffer = Buffer::from_vec(bytes);
    let compressed = buffer
        .compress()
        .ok_or_else(|| eyre!("compression failed (input empty or LZ4 error)"))?;
    fs::write(output, compressed.bytes()).with_context(|| format!("writing {output}"))?;
    println!(
        "compressed {} bytes to {} bytes -> {output}",
        buffer.size(),
        compressed.size()
    );
    Ok(())
}
