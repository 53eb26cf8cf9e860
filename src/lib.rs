//! Template views for axum backed by MiniJinja, with debounced hot reloading.
//!
//! A [`Views`] instance owns the view configuration, a [`TemplateEngine`] and,
//! when hot reloading is enabled, a [`WatchRegistry`] that invalidates compiled
//! templates after their source files change on disk.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
#[cfg(feature = "http-server")]
pub mod http;
pub mod logging;
pub mod resolve;
pub mod views;
pub mod watcher;

pub use config::{HotReloadConfig, Settings, ViewConfig};
pub use engine::{CompiledTemplate, JinjaEngine, TemplateEngine};
pub use error::{ConfigError, EngineError, ViewError};
pub use resolve::resolve_template;
pub use views::{RenderOptions, Rendered, ViewOverrides, Views};
pub use watcher::{WatchError, WatchRegistry};

#[cfg(feature = "http-server")]
pub use http::{SharedViews, ViewResponse, view};
