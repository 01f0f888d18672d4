//! Filesystem access
//!
//! Settings persistence and the directory listing used to browse model files.

use std::path::PathBuf;
use thiserror::Error;

pub mod files;
pub mod settings;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to access config directory: {0}")]
    ConfigDirError(String),
    #[error("Directory '{}' does not exist.", .0.display())]
    DirectoryNotFound(PathBuf),
    #[error("'{}' is not a directory.", .0.display())]
    NotADirectory(PathBuf),
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to serialize/deserialize JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Get the application config directory
///
/// Returns the platform-specific config directory:
/// - Windows: `C:\Users\{user}\AppData\Roaming\llamagate\llamagate\config`
/// - macOS: `/Users/{user}/Library/Application Support/dev.llamagate.llamagate`
/// - Linux: `/home/{user}/.config/llamagate`
pub fn get_config_dir() -> Result<PathBuf, StorageError> {
    directories::ProjectDirs::from("dev", "llamagate", "llamagate")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| {
            StorageError::ConfigDirError("Could not determine config directory".to_string())
        })
}
