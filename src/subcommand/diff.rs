use crate::buffer::Buffer;
use crate::memory_range::ByteRange;
use eyre::{eyre, Context, Result};
use std::fs;

pub fn run(source: &str, target: &str, output: &str) -> Result<()> {
    let source_buffer = Buffer::from_vec(fs::read(source).with_context(|| format!("reading {source}"))?);
    let target_buffer = Buffer::from_vec(fs::read(target).with_context(|| format!("reading {target}"))?);

    let diff = source_buffer
        .diff(&target_buffer)
        .ok_or_else(|| eyre!("diff failed (both inputs empty, or compression failed)"))?;
    fs::write(output, diff.bytes()).with_context(|| format!("writing {output}"))?;
    println!("diffed {source} -> {target}: {} bytes -> {output}", diff.size());
    Ok(())
}
