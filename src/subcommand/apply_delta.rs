use crate::directory::Directory;
use eyre::{eyre, Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

pub fn run(folder: &str, delta: &str) -> Result<()> {
    let root = Path::new(folder);
    let before = Directory::in_folder(root).with_context(|| format!("walking {folder}"))?;

    let bytes = fs::read(delta).with_context(|| format!("reading {delta}"))?;
    let range = crate::memory_range::MemoryRange::new(&bytes);
    let after = before
        .out_delta(&range)
        .ok_or_else(|| eyre!("bad delta header or decompression error"))?;

    let after_paths: BTreeSet<&str> = after.files().iter().map(|f| f.relative_path.as_str()).collect();
    for file in before.files() {
        if !after_paths.contains(file.relative_path.as_str()) {
            let path = root.join(&file.relative_path);
            if path.exists() {
                fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
            }
        }
    }

    after.out_folder(root).with_context(|| format!("writing {folder}"))?;
    println!("applied {delta} to {folder}: now {} files", after.file_count());
    Ok(())
}
