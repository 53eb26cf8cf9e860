//! Template engine seam.
//!
//! [`TemplateEngine`] is what views and the hot-reload watcher talk to:
//! `load` compiles (or returns a cached) template, `invalidate` drops a stale
//! one so the next `load` recompiles from source. The default implementation
//! is [`JinjaEngine`].

mod jinja;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::EngineError;

pub use jinja::{JinjaEngine, JinjaTemplate};

/// Suffix of compiled artifacts unless an engine says otherwise.
pub const DEFAULT_COMPILED_SUFFIX: &str = ".compiled";

/// A template ready to render.
pub trait CompiledTemplate: Send + Sync {
    /// Render with the given context.
    fn render(&self, context: &serde_json::Value) -> Result<String, EngineError>;
}

/// A templating engine with a compiled-template cache.
///
/// Paths handed to an engine are absolute; the same path is later passed to
/// [`invalidate`](Self::invalidate) when the source changes.
pub trait TemplateEngine: Send + Sync {
    /// Compile the template at `path`, or return the cached compilation.
    fn load(&self, path: &Path) -> Result<Arc<dyn CompiledTemplate>, EngineError>;

    /// Forget the compiled form of `path`, and of every template that pulled
    /// `path` in.
    fn invalidate(&self, path: &Path);

    /// Other files the cached compilation of `path` was built from, such as
    /// included partials. Watching these keeps includers fresh.
    fn dependencies(&self, _path: &Path) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Suffix appended to a source path to name its compiled artifact.
    fn compiled_suffix(&self) -> &str {
        DEFAULT_COMPILED_SUFFIX
    }
}

/// `<source><suffix>`, e.g. `hello.jinja` -> `hello.jinja.compiled`.
pub fn compiled_artifact_path(source: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(source.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiled_artifact_path() {
        assert_eq!(
            compiled_artifact_path(Path::new("/tpl/hello.jinja"), ".compiled"),
            PathBuf::from("/tpl/hello.jinja.compiled")
        );
        assert_eq!(
            compiled_artifact_path(Path::new("rel/a.html"), ".js"),
            PathBuf::from("rel/a.html.js")
        );
    }
}
