//! Virtual, in-memory directory trees, and their package/delta serializations.
//!
//! A [`Directory`] is a flat list of [`VirtualFile`]s read off disk (or from a package
//! or delta) and held entirely in memory; `in_*`/`out_*` pairs mirror the naming used
//! elsewhere in the crate for "bring into memory" / "write back out."

use crate::buffer::Buffer;
use crate::compress;
use crate::memory_range::{ByteRange, MemoryRange, ZERO_HASH};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

const PACKAGE_TITLE: &str = "yatta pack";
const PACKAGE_TITLE_WIDTH: usize = 16;
const DELTA_TITLE: &str = "yatta delta";
const DELTA_TITLE_WIDTH: usize = 16;

/// A single file captured in memory, relative to some directory root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualFile {
    pub relative_path: String,
    pub data: Buffer,
}

impl VirtualFile {
    pub fn new(relative_path: impl Into<String>, data: Buffer) -> Self {
        Self {
            relative_path: relative_path.into(),
            data,
        }
    }

    /// Combine the path and the file's content hash into a single change-detection
    /// value; two files with the same path but different content hash differently.
    fn hash(&self) -> u64 {
        let mut value = ZERO_HASH;
        for byte in self.relative_path.as_bytes() {
            value = value.wrapping_mul(33).wrapping_add(*byte as u64);
        }
        value.wrapping_mul(33).wrapping_add(self.data.hash())
    }
}

/// True if `relative_path` matches any of `exclusions`. An exclusion beginning with
/// `.` is matched against the path's extension; any other exclusion is matched
/// against the full relative path.
fn is_excluded(relative_path: &str, exclusions: &[String]) -> bool {
    let extension = Path::new(relative_path).extension().and_then(|e| e.to_str());
    exclusions.iter().any(|pattern| match pattern.strip_prefix('.') {
        Some(ext) => extension == Some(ext),
        None => pattern == relative_path,
    })
}

/// Path-level classification of two directory snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryDiffSummary {
    pub common: Vec<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// An in-memory snapshot of a directory tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    files: Vec<VirtualFile>,
}

impl Directory {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn file_size(&self) -> u64 {
        self.files.iter().map(|f| f.data.size() as u64).sum()
    }

    pub fn files(&self) -> &[VirtualFile] {
        &self.files
    }

    /// A change-detection hash over the whole tree: order-independent sum of each
    /// file's own hash.
    pub fn hash(&self) -> u64 {
        self.files
            .iter()
            .fold(ZERO_HASH, |acc, f| acc.wrapping_add(f.hash()))
    }

    /// Classify `other` against `self` into files present in both, only in `other`, and
    /// only in `self`.
    pub fn classify(&self, other: &Directory) -> DirectoryDiffSummary {
        let old_paths: BTreeSet<&str> = self.files.iter().map(|f| f.relative_path.as_str()).collect();
        let new_paths: BTreeSet<&str> = other.files.iter().map(|f| f.relative_path.as_str()).collect();
        DirectoryDiffSummary {
            common: old_paths.intersection(&new_paths).map(|s| s.to_string()).collect(),
            added: new_paths.difference(&old_paths).map(|s| s.to_string()).collect(),
            removed: old_paths.difference(&new_paths).map(|s| s.to_string()).collect(),
        }
    }

    /// Recursively ingest every regular file under `root` into memory, with paths
    /// stored relative to `root` using forward slashes.
    pub fn in_folder(root: &Path) -> std::io::Result<Self> {
        Self::in_folder_excluding(root, &[])
    }

    /// Like [`Directory::in_folder`], but skips any entry matching an exclusion. An
    /// exclusion starting with `.` matches a file extension (without the dot);
    /// otherwise it matches the full forward-slash relative path.
    pub fn in_folder_excluding(root: &Path, exclusions: &[String]) -> std::io::Result<Self> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let relative_path = relative.to_string_lossy().replace('\\', "/");
            if is_excluded(&relative_path, exclusions) {
                continue;
            }
            let bytes = fs::read(entry.path())?;
            files.push(VirtualFile::new(relative_path, Buffer::from_vec(bytes)));
        }
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        tracing::debug!(root = %root.display(), count = files.len(), "ingested folder");
        Ok(Self { files })
    }

    /// Write every captured file back out under `root`, creating directories as needed.
    pub fn out_folder(&self, root: &Path) -> std::io::Result<()> {
        for file in &self.files {
            let dest = root.join(&file.relative_path);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(dest, file.data.bytes())?;
        }
        Ok(())
    }

    /// Serialize this tree into a compressed package buffer, tagged with
    /// `folder_name` (the directory's own name, not its full path).
    pub fn in_package(&self, folder_name: &str) -> Option<Buffer> {
        let mut payload = Buffer::empty_buffer();
        payload.push_u64(self.files.len() as u64);
        for file in &self.files {
            payload.push_string(&file.relative_path);
            payload.push_u64(file.data.size() as u64);
            payload.push_raw(file.data.bytes());
        }

        let compressed = if payload.empty() {
            Buffer::empty_buffer()
        } else {
            payload.compress()?
        };

        let mut out = Buffer::empty_buffer();
        out.push_title(PACKAGE_TITLE, PACKAGE_TITLE_WIDTH);
        out.push_string(folder_name);
        out.push_raw(compressed.bytes());
        tracing::debug!(folder_name, files = self.files.len(), "packaged directory");
        Some(out)
    }

    /// Parse a buffer written by [`Directory::in_package`], returning the stored
    /// folder name alongside the reconstructed tree. `None` on header mismatch or
    /// decompression failure.
    pub fn out_package(range: &dyn ByteRange) -> Option<(String, Self)> {
        if range.size() < PACKAGE_TITLE_WIDTH {
            return None;
        }
        let title = range.read_title(0, PACKAGE_TITLE_WIDTH).ok()?;
        if title != PACKAGE_TITLE {
            return None;
        }
        let (folder_name, offset) = range.read_string(PACKAGE_TITLE_WIDTH).ok()?;
        let compressed_bytes = range.read_bytes(offset, range.size() - offset).ok()?;

        let payload = if compressed_bytes.is_empty() {
            Buffer::empty_buffer()
        } else {
            compress::decompress_range(&MemoryRange::new(&compressed_bytes))?
        };

        let payload_range = payload.as_range();
        let mut files = Vec::new();
        if payload_range.has_data() {
            let file_count = payload_range.read_u64(0).ok()? as usize;
            let mut cursor = 8;
            for _ in 0..file_count {
                let (relative_path, next) = payload_range.read_string(cursor).ok()?;
                cursor = next;
                let data_len = payload_range.read_u64(cursor).ok()? as usize;
                cursor += 8;
                let data = payload_range.read_bytes(cursor, data_len).ok()?;
                cursor += data_len;
                files.push(VirtualFile::new(relative_path, Buffer::from_vec(data)));
            }
        }
        Some((folder_name, Self { files }))
    }

    /// Compute a delta transforming `self` (the old tree) into `new` (the new tree).
    /// Unchanged files are omitted entirely; changed and added files carry a binary
    /// diff (against the prior content, or against an empty buffer for additions)
    /// rather than their full new content. Every record shares the same
    /// `(path, flag, oldHash, newHash, payloadLen, payload)` layout regardless of
    /// flag, per the on-wire format.
    pub fn in_delta(&self, new: &Directory) -> Option<Buffer> {
        let mut old_by_path: BTreeMap<&str, &VirtualFile> = self
            .files
            .iter()
            .map(|f| (f.relative_path.as_str(), f))
            .collect();

        struct Op<'a> {
            path: &'a str,
            flag: u8,
            old_hash: u64,
            new_hash: u64,
            payload: Buffer,
        }

        let empty = Buffer::empty_buffer();
        let mut ops = Vec::new();
        for new_file in &new.files {
            match old_by_path.remove(new_file.relative_path.as_str()) {
                Some(old_file) => {
                    let old_hash = old_file.data.hash();
                    let new_hash = new_file.data.hash();
                    if old_hash != new_hash {
                        let payload = old_file.data.diff(&new_file.data)?;
                        ops.push(Op {
                            path: new_file.relative_path.as_str(),
                            flag: b'U',
                            old_hash,
                            new_hash,
                            payload,
                        });
                    }
                }
                None => {
                    let payload = Buffer::diff_ranges(&empty, &new_file.data)?;
                    ops.push(Op {
                        path: new_file.relative_path.as_str(),
                        flag: b'N',
                        old_hash: 0,
                        new_hash: new_file.data.hash(),
                        payload,
                    });
                }
            }
        }
        for (path, old_file) in &old_by_path {
            ops.push(Op {
                path,
                flag: b'D',
                old_hash: old_file.data.hash(),
                new_hash: 0,
                payload: Buffer::empty_buffer(),
            });
        }

        let mut records = Buffer::empty_buffer();
        for op in &ops {
            records.push_string(op.path);
            records.push_raw(&[op.flag]);
            records.push_u64(op.old_hash);
            records.push_u64(op.new_hash);
            records.push_u64(op.payload.size() as u64);
            records.push_raw(op.payload.bytes());
        }

        let compressed = if records.empty() {
            Buffer::empty_buffer()
        } else {
            records.compress()?
        };

        let mut out = Buffer::empty_buffer();
        out.push_title(DELTA_TITLE, DELTA_TITLE_WIDTH);
        out.push_u64(ops.len() as u64);
        out.push_raw(compressed.bytes());
        tracing::debug!(instructions = ops.len(), "computed directory delta");
        Some(out)
    }

    /// Apply a delta produced by [`Directory::in_delta`] to `self` (the old tree),
    /// producing the new tree. `None` only on header mismatch or decompression
    /// failure; a `'U'` instruction whose target can't be located (`MissingTarget`)
    /// or whose patched result doesn't match `newHash` (`PatchMismatch`) is a silent
    /// per-file no-op rather than a fatal error, per the core's error-handling design.
    pub fn out_delta(&self, delta: &dyn ByteRange) -> Option<Directory> {
        if delta.size() < DELTA_TITLE_WIDTH {
            return None;
        }
        let title = delta.read_title(0, DELTA_TITLE_WIDTH).ok()?;
        if title != DELTA_TITLE {
            return None;
        }
        let op_count = delta.read_u64(DELTA_TITLE_WIDTH).ok()? as usize;

        let header_size = DELTA_TITLE_WIDTH + 8;
        let compressed_bytes = delta.read_bytes(header_size, delta.size() - header_size).ok()?;
        let records = if compressed_bytes.is_empty() {
            Buffer::empty_buffer()
        } else {
            compress::decompress_range(&MemoryRange::new(&compressed_bytes))?
        };
        let records_range = records.as_range();

        let mut by_path: BTreeMap<String, VirtualFile> = self
            .files
            .iter()
            .cloned()
            .map(|f| (f.relative_path.clone(), f))
            .collect();

        let mut offset = 0;
        for _ in 0..op_count {
            let (relative_path, next) = records_range.read_string(offset).ok()?;
            offset = next;
            let tag = records_range.read_u8(offset).ok()?;
            offset += 1;
            let old_hash = records_range.read_u64(offset).ok()?;
            offset += 8;
            let new_hash = records_range.read_u64(offset).ok()?;
            offset += 8;
            let len = records_range.read_u64(offset).ok()? as usize;
            offset += 8;
            let payload_bytes = records_range.read_bytes(offset, len).ok()?;
            offset += len;

            match tag {
                b'N' => {
                    if let Some(existing) = by_path.get(&relative_path) {
                        if existing.data.hash() == old_hash {
                            by_path.remove(&relative_path);
                        }
                    }
                    let Some(patched) = Buffer::empty_buffer().patch(&Buffer::from_vec(payload_bytes)) else {
                        tracing::debug!(relative_path, "out_delta: new-file patch failed");
                        continue;
                    };
                    if patched.hash() != new_hash {
                        tracing::debug!(relative_path, "out_delta: new-file hash mismatch, skipping");
                        continue;
                    }
                    by_path.insert(relative_path.clone(), VirtualFile::new(relative_path, patched));
                }
                b'U' => {
                    let Some(existing) = by_path.get(&relative_path) else {
                        tracing::debug!(relative_path, "out_delta: update target missing, skipping");
                        continue;
                    };
                    if existing.data.hash() != old_hash {
                        tracing::debug!(relative_path, "out_delta: update target hash mismatch, skipping");
                        continue;
                    }
                    let existing_data = existing.data.clone();
                    let Some(patched) = existing_data.patch(&Buffer::from_vec(payload_bytes)) else {
                        tracing::debug!(relative_path, "out_delta: patch failed, leaving unchanged");
                        continue;
                    };
                    if patched.hash() != new_hash {
                        tracing::debug!(relative_path, "out_delta: patched hash mismatch, leaving unchanged");
                        continue;
                    }
                    by_path.insert(relative_path.clone(), VirtualFile::new(relative_path, patched));
                }
                b'D' => {
                    if let Some(existing) = by_path.get(&relative_path) {
                        if existing.data.hash() == old_hash {
                            by_path.remove(&relative_path);
                        } else {
                            tracing::debug!(relative_path, "out_delta: delete hash mismatch, skipping");
                        }
                    }
                }
                _ => {
                    tracing::debug!(offset, "out_delta: unrecognized op tag, stopping");
                    break;
                }
            }
        }

        let mut files: Vec<VirtualFile> = by_path.into_values().collect();
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Some(Directory { files })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, contents: &[u8]) -> VirtualFile {
        VirtualFile::new(path, Buffer::from_vec(contents.to_vec()))
    }

    #[test]
    fn empty_directory_is_empty() {
        let dir = Directory::empty();
        assert!(!dir.has_files());
        assert_eq!(dir.file_count(), 0);
        assert_eq!(dir.hash(), ZERO_HASH);
    }

    #[test]
    fn package_round_trips() {
        let dir = Directory {
            files: vec![
                file("a.txt", b"hello world"),
                file("nested/b.bin", &[1, 2, 3, 4, 5]),
            ],
        };
        let packaged = dir.in_package("my-folder").expect("package");
        let (folder_name, restored) = Directory::out_package(&packaged.as_range()).expect("unpackage");
        assert_eq!(folder_name, "my-folder");
        assert_eq!(restored.file_count(), 2);
        assert_eq!(restored.hash(), dir.hash());
    }

    #[test]
    fn delta_round_trips_update_add_and_delete() {
        let old = Directory {
            files: vec![
                file("keep.txt", b"unchanged"),
                file("change.txt", &[0u8; 200]),
                file("remove.txt", b"going away"),
            ],
        };
        let mut changed = vec![1u8; 200];
        changed.extend_from_slice(b"tail");
        let new = Directory {
            files: vec![
                file("keep.txt", b"unchanged"),
                file("change.txt", &changed),
                file("added.txt", b"brand new file"),
            ],
        };

        let delta = old.in_delta(&new).expect("delta");
        let applied = old.out_delta(&delta.as_range()).expect("apply delta");
        assert_eq!(applied.hash(), new.hash());
        assert_eq!(applied.file_count(), 3);
    }

    #[test]
    fn classify_reports_common_added_removed() {
        let old = Directory {
            files: vec![file("a.txt", b"1"), file("b.txt", b"2")],
        };
        let new = Directory {
            files: vec![file("b.txt", b"2"), file("c.txt", b"3")],
        };
        let summary = old.classify(&new);
        assert_eq!(summary.common, vec!["b.txt".to_string()]);
        assert_eq!(summary.added, vec!["c.txt".to_string()]);
        assert_eq!(summary.removed, vec!["a.txt".to_string()]);
    }

    #[test]
    fn out_package_rejects_wrong_header() {
        let garbage = Buffer::from_vec(vec![0u8; 32]);
        assert!(Directory::out_package(&garbage.as_range()).is_none());
    }

    #[test]
    fn in_folder_excluding_skips_by_path_and_extension() {
        let root = tempfile::tempdir().expect("tempdir");
        fs::write(root.path().join("keep.txt"), b"keep me").unwrap();
        fs::write(root.path().join("secret.env"), b"API_KEY=1").unwrap();
        fs::create_dir(root.path().join("logs")).unwrap();
        fs::write(root.path().join("logs/run.log"), b"log line").unwrap();

        let dir = Directory::in_folder_excluding(
            root.path(),
            &[".log".to_string(), "secret.env".to_string()],
        )
        .expect("ingest");

        let paths: Vec<&str> = dir.files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["keep.txt"]);
    }

    #[test]
    fn delta_added_file_uses_diff_against_empty_buffer() {
        let old = Directory::empty();
        let new = Directory {
            files: vec![file("added.txt", b"brand new content")],
        };
        let delta = old.in_delta(&new).expect("delta");
        let applied = old.out_delta(&delta.as_range()).expect("apply delta");
        assert_eq!(applied.hash(), new.hash());
        assert_eq!(applied.file_count(), 1);
    }

    #[test]
    fn delta_update_with_wrong_old_hash_is_skipped_silently() {
        let old = Directory {
            files: vec![file("a.txt", b"original")],
        };
        let new = Directory {
            files: vec![file("a.txt", b"changed")],
        };
        let delta = old.in_delta(&new).expect("delta");

        // Simulate a directory that has already drifted from what the delta expects.
        let drifted = Directory {
            files: vec![file("a.txt", b"drifted content, not what delta expects")],
        };
        let applied = drifted.out_delta(&delta.as_range()).expect("apply delta");
        assert_eq!(applied.hash(), drifted.hash());
    }
}
