use crate::buffer::Buffer;
use crate::memory_range::ByteRange;
use eyre::{eyre, Context, Result};
use std::fs;

pub fn run(source: &str, diff: &str, output: &str) -> Result<()> {
    let source_buffer = Buffer::from_vec(fs::read(source).with_context(|| format!("reading {source}"))?);
    let diff_buffer = Buffer::from_vec(fs::read(diff).with_context(|| format!("reading {diff}"))?);

    let target = source_buffer
        .patch(&diff_buffer)
        .ok_or_else(|| eyre!("patch failed (bad diff header or decompression error)"))?;
    fs::write(output, target.bytes()).with_context(|| format!("writing {output}"))?;
    println!("patched {source} with {diff}: {} bytes -> {output}", target.size());
    Ok(())
}
