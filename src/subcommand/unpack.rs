use crate::directory::Directory;
use eyre::{eyre, Context, Result};
use std::fs;
use std::path::Path;

pub fn run(package: &str, output_dir: &str) -> Result<()> {
    let bytes = fs::read(package).with_context(|| format!("reading {package}"))?;
    let range = crate::memory_range::MemoryRange::new(&bytes);
    let (folder_name, directory) =
        Directory::out_package(&range).ok_or_else(|| eyre!("bad package header or decompression error"))?;

    let root = Path::new(output_dir);
    directory.out_folder(root).with_context(|| format!("writing {output_dir}"))?;
    println!(
        "unpacked {} files from package \"{folder_name}\" -> {output_dir}",
        directory.file_count()
    );
    Ok(())
}
