//! Error types for the watch registry.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from watcher operations.
///
/// Most of these never reach a caller: they are handed to the registry's
/// error hook so a broken watch never breaks rendering.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("Cannot expand glob '{pattern}': {reason}")]
    GlobFailed { pattern: String, reason: String },

    #[error("Failed to remove compiled artifact {path}: {reason}")]
    ArtifactRemoval { path: PathBuf, reason: String },

    #[error("File system event error: {details}")]
    EventError { details: String },

    #[error("Watch registry is closed")]
    ChannelClosed,
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}
