use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

/// Creates an empty temp file in the same directory as `target`, so it can
/// later be renamed over it without crossing filesystems.
pub fn create_temp_file_beside<P: AsRef<Path>>(target: P) -> io::Result<NamedTempFile> {
    let dir = parent_dir(target.as_ref());
    tempfile::Builder::new()
        .prefix(".chapterize-")
        .suffix(".tmp")
        .tempfile_in(dir)
}

/// Copies `source` into a temp file beside it.
pub fn copy_to_temp_beside<P: AsRef<Path>>(source: P) -> io::Result<NamedTempFile> {
    let temp = create_temp_file_beside(&source)?;
    fs::copy(source.as_ref(), temp.path())?;
    Ok(temp)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
