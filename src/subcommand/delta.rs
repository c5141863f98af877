use crate::directory::Directory;
use crate::memory_range::ByteRange;
use eyre::{eyre, Context, Result};
use std::fs;
use std::path::Path;

pub fn run(old: &str, new: &str, output: &str, exclude: &[String]) -> Result<()> {
    let old_directory = Directory::in_folder_excluding(Path::new(old), exclude)
        .with_context(|| format!("walking {old}"))?;
    let new_directory = Directory::in_folder_excluding(Path::new(new), exclude)
        .with_context(|| format!("walking {new}"))?;

    let summary = old_directory.classify(&new_directory);
    let delta = old_directory
        .in_delta(&new_directory)
        .ok_or_else(|| eyre!("delta computation failed"))?;
    fs::write(output, delta.bytes()).with_context(|| format!("writing {output}"))?;
    println!(
        "delta {old} -> {new}: {} common, {} added, {} removed, {} bytes -> {output}",
        summary.common.len(),
        summary.added.len(),
        summary.removed.len(),
        delta.size()
    );
    Ok(())
}
