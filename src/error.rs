//! Error types for configuration, template engines and rendering.

use std::path::PathBuf;
use thiserror::Error;

use crate::watcher::WatchError;

/// Errors raised while assembling or validating configuration.
///
/// These are fatal at setup time: a [`Views`](crate::Views) is never built
/// from an invalid configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required option: {0}")]
    MissingOption(&'static str),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Failed to load settings: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Hot reloading requires a running tokio runtime")]
    NoRuntime,
}

/// Errors raised by a [`TemplateEngine`](crate::TemplateEngine).
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Cannot read template {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Template(#[from] minijinja::Error),
}

/// Errors surfaced to callers of the render API.
#[derive(Error, Debug)]
pub enum ViewError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The engine failed to load or render a template. Surfaced over HTTP as
    /// a generic 500; the message is kept for diagnostics.
    #[error("Could not load template {}: {message}", path.display())]
    TemplateLoad { path: PathBuf, message: String },

    #[error(transparent)]
    Watch(#[from] WatchError),
}

impl ViewError {
    pub(crate) fn template_load(path: impl Into<PathBuf>, err: &EngineError) -> Self {
        ViewError::TemplateLoad {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Whether this error represents a server-side implementation failure.
    pub fn is_internal(&self) -> bool {
        matches!(self, ViewError::TemplateLoad { .. } | ViewError::Watch(_))
    }
}

pub type ViewResult<T> = Result<T, ViewError>;
