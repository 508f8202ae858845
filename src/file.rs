use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub enum EntryKind {
    File(PathBuf),
    Directory(PathBuf),
    Other(PathBuf), // symlink, device, etc.
}

pub fn list_dir<P: AsRef<Path>>(path: P) -> Result<Vec<EntryKind>> {
    let entries = fs::read_dir(path.as_ref())
        .with_context(|| format!("Failed to read directory: {}", path.as_ref().display()))?;

    let mut results = Vec::new();

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        let kind = if file_type.is_file() {
            EntryKind::File(path)
        } else if file_type.is_dir() {
            EntryKind::Directory(path)
        } else {
            EntryKind::Other(path)
        };

        results.push(kind);
    }

    Ok(results)
}

pub fn is_mp3(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"))
}

/// MP3 files to process for `target`, sorted by path.
///
/// A file target is returned as-is whatever its extension; a directory yields
/// its `*.mp3` files, and those of its sub-directories when `recursive`.
pub fn find_mp3_files<P: AsRef<Path>>(target: P, recursive: bool) -> Result<Vec<PathBuf>> {
    let target = target.as_ref();
    if target.is_file() {
        return Ok(vec![target.to_path_buf()]);
    }
    if !target.is_dir() {
        anyhow::bail!("Path does not exist: {}", target.display());
    }

    let mut files = Vec::new();
    collect_mp3_files(target, recursive, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_mp3_files(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in list_dir(dir)? {
        match entry {
            EntryKind::File(path) if is_mp3(&path) => out.push(path),
            EntryKind::File(_) => {}
            EntryKind::Directory(path) if recursive => collect_mp3_files(&path, recursive, out)?,
            EntryKind::Directory(_) => {}
            EntryKind::Other(path) => log::debug!("Ignoring {}", path.display()),
        }
    }
    Ok(())
}
