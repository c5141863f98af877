use crate::directory::Directory;
use eyre::{eyre, Context, Result};
use std::fs;
use std::path::Path;

pub fn run(folder: &str, output: &str, name: Option<&str>, exclude: &[String]) -> Result<()> {
    let root = Path::new(folder);
    let folder_name = name.map(str::to_owned).unwrap_or_else(|| {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    let directory = Directory::in_folder_excluding(root, exclude)
        .with_context(|| format!("walking {folder}"))?;
    let package = directory
        .in_package(&folder_name)
        .ok_or_else(|| eyre!("packaging failed"))?;
    fs::write(output, package.bytes()).with_context(|| format!("writing {output}"))?;
    println!(
        "packed {} files ({} bytes) from {folder} -> {output}",
        directory.file_count(),
        directory.file_size()
    );
    Ok(())
}
