//! Directory listing
//!
//! Lists the regular files of a directory, e.g. to pick a model to load.

use std::fs;
use std::path::Path;

use crate::storage::StorageError;
use crate::types::requests::FileEntry;

/// Lists regular files directly inside `directory`, sorted by name.
///
/// Subdirectories are skipped. Entries that vanish while listing are ignored.
pub fn list_files(directory: &Path) -> Result<Vec<FileEntry>, StorageError> {
    if !directory.exists() {
        return Err(StorageError::DirectoryNotFound(directory.to_path_buf()));
    }
    if !directory.is_dir() {
        return Err(StorageError::NotADirectory(directory.to_path_buf()));
    }

    let mut files = vec![];

    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        files.push(FileEntry {
            name,
            path: path.to_string_lossy().into_owned(),
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));

    tracing::debug!("Found {} file(s) in {}", files.len(), directory.display());

    Ok(files)
}
