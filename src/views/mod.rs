//! Render dispatch.
//!
//! [`Views`] ties the pieces together: it resolves template identifiers to
//! files, registers them with the hot-reload watcher when enabled, merges the
//! global context under the call's context and hands the result to the
//! engine.

mod context;
mod options;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ViewConfig;
use crate::engine::{JinjaEngine, TemplateEngine};
use crate::error::{ConfigError, ViewError, ViewResult};
use crate::resolve::resolve_template;
use crate::watcher::{NotifyBackend, WatchBackend, WatchRegistry};

pub use context::merge_context;
pub use options::{RenderOptions, ViewOverrides};

/// A rendered template and the headers it should be served with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub body: String,
    pub content_type: String,
    pub encoding: String,
}

impl Rendered {
    /// Value for the `Content-Type` header, e.g. `text/html; charset=utf-8`.
    pub fn content_type_header(&self) -> String {
        format!("{}; charset={}", self.content_type, self.encoding)
    }
}

/// Template views bound to one configuration.
///
/// # Examples
///
/// ```no_run
/// use hotview::{ViewConfig, Views};
/// use serde_json::json;
///
/// # fn main() -> Result<(), hotview::ViewError> {
/// let views = Views::new(ViewConfig::new("templates"))?;
/// let page = views.render("hello", json!({ "name": "world" }))?;
/// println!("{}", page.body);
/// # Ok(())
/// # }
/// ```
pub struct Views {
    config: ViewConfig,
    defaults: RenderOptions,
    engine: Arc<dyn TemplateEngine>,
    registry: Option<WatchRegistry>,
}

impl Views {
    /// Build views with the default MiniJinja engine.
    ///
    /// With hot reloading enabled this must run inside a tokio runtime.
    pub fn new(config: ViewConfig) -> ViewResult<Self> {
        let engine = JinjaEngine::new()
            .persist_compiled(config.persist_compiled)
            .with_compiled_suffix(config.compiled_suffix.clone());
        Self::with_engine(config, Arc::new(engine))
    }

    /// Build views around a caller-supplied engine.
    pub fn with_engine(config: ViewConfig, engine: Arc<dyn TemplateEngine>) -> ViewResult<Self> {
        Self::build(config, engine, Box::new(NotifyBackend::new()))
    }

    /// Build views whose hot reloading watches files through `backend`.
    pub fn with_backend(
        config: ViewConfig,
        engine: Arc<dyn TemplateEngine>,
        backend: impl WatchBackend + 'static,
    ) -> ViewResult<Self> {
        Self::build(config, engine, Box::new(backend))
    }

    fn build(
        config: ViewConfig,
        engine: Arc<dyn TemplateEngine>,
        backend: Box<dyn WatchBackend>,
    ) -> ViewResult<Self> {
        config.validate()?;

        let registry = if config.hot_reloading.enabled {
            Some(Self::start_registry(&config, engine.clone(), backend)?)
        } else {
            None
        };

        crate::debug_event!(
            "views",
            "ready",
            "{} (hot reload {})",
            config
                .base_dir()
                .map(|d| d.display().to_string())
                .unwrap_or_default(),
            if registry.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            defaults: RenderOptions::from_config(&config),
            config,
            engine,
            registry,
        })
    }

    fn start_registry(
        config: &ViewConfig,
        engine: Arc<dyn TemplateEngine>,
        backend: Box<dyn WatchBackend>,
    ) -> ViewResult<WatchRegistry> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(ConfigError::NoRuntime.into());
        }

        let base_dir = config.base_dir().map(|dir| absolute_or_same(&dir));
        let registry = WatchRegistry::builder(engine)
            .delay_ms(config.hot_reloading.delay_ms)
            .boxed_backend(backend)
            .base_dir(base_dir)
            .start()?;

        // Expansion runs in the background so construction never waits on
        // the filesystem.
        for pattern in &config.hot_reloading.watch_files {
            registry.spawn_register_glob(pattern.clone());
        }

        Ok(registry)
    }

    /// Render `template` with the configured options.
    pub fn render(&self, template: &str, context: serde_json::Value) -> ViewResult<Rendered> {
        self.render_with(template, context, &ViewOverrides::default())
    }

    /// Render `template` with per-call option overrides.
    pub fn render_with(
        &self,
        template: &str,
        context: serde_json::Value,
        overrides: &ViewOverrides,
    ) -> ViewResult<Rendered> {
        let options = self.defaults.merge(overrides);
        let path = absolute_or_same(&resolve_template(template, &options));

        // Nothing to watch until the file exists; the load below reports it.
        if path.is_file() {
            self.watch(&path);
        }

        let context = merge_context(&self.config.context, context);
        let compiled = self
            .engine
            .load(&path)
            .map_err(|e| ViewError::template_load(&path, &e))?;
        let body = compiled
            .render(&context)
            .map_err(|e| ViewError::template_load(&path, &e))?;

        // Includes are only known once rendered.
        if self.registry.is_some() {
            for dependency in self.engine.dependencies(&path) {
                self.watch(&dependency);
            }
        }

        Ok(Rendered {
            body,
            content_type: options.content_type,
            encoding: options.encoding,
        })
    }

    /// Register `path` with the hot-reload watcher, if any.
    ///
    /// A broken watch must never break rendering, so errors only reach the
    /// registry's error hook.
    fn watch(&self, path: &Path) {
        let Some(registry) = &self.registry else {
            return;
        };
        if let Err(e) = registry.register_file(path) {
            registry.report(&e);
        }
    }

    /// Resolve `template` to the file a render would load.
    pub fn resolve(&self, template: &str) -> PathBuf {
        absolute_or_same(&resolve_template(template, &self.defaults))
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn defaults(&self) -> &RenderOptions {
        &self.defaults
    }

    pub fn engine(&self) -> &Arc<dyn TemplateEngine> {
        &self.engine
    }

    /// The hot-reload registry, when hot reloading is enabled.
    pub fn registry(&self) -> Option<&WatchRegistry> {
        self.registry.as_ref()
    }

    pub fn is_hot_reloading(&self) -> bool {
        self.registry.is_some()
    }

    /// Stop watching templates. Rendering keeps working.
    pub fn close(&self) {
        if let Some(registry) = &self.registry {
            registry.close();
        }
    }
}

/// Absolute form of `path` so engine cache keys match watcher keys.
fn absolute_or_same(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
