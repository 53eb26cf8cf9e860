//! MiniJinja-backed [`TemplateEngine`].

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use minijinja::Environment;
use parking_lot::{Mutex, RwLock};

use super::{CompiledTemplate, DEFAULT_COMPILED_SUFFIX, TemplateEngine, compiled_artifact_path};
use crate::error::EngineError;

/// A compiled template together with the environment that owns it.
///
/// Each template gets its own environment whose loader resolves
/// `{% include %}` and `{% extends %}` relative to the template's directory.
/// The environment keeps what it loaded, so every file pulled in through the
/// loader is recorded as a dependency.
pub struct JinjaTemplate {
    name: String,
    env: Environment<'static>,
    dependencies: Arc<Mutex<HashSet<PathBuf>>>,
}

impl JinjaTemplate {
    /// Files loaded through `{% include %}`, `{% extends %}` or `{% import %}`
    /// so far, transitively.
    pub fn dependencies(&self) -> Vec<PathBuf> {
        let mut deps: Vec<_> = self.dependencies.lock().iter().cloned().collect();
        deps.sort();
        deps
    }

    fn depends_on(&self, path: &Path) -> bool {
        self.dependencies.lock().contains(path)
    }
}

/// Loader resolving names under `dir` that records every file it serves.
fn recording_loader(
    dir: PathBuf,
    dependencies: Arc<Mutex<HashSet<PathBuf>>>,
) -> impl Fn(&str) -> Result<Option<String>, minijinja::Error> + Send + Sync + 'static {
    let load = minijinja::path_loader(dir.clone());
    move |name: &str| {
        let source = load(name)?;
        if source.is_some() {
            // path_loader only serves names made of plain `/`-separated segments
            let path = name
                .split('/')
                .filter(|segment| !segment.is_empty())
                .fold(dir.clone(), |path, segment| path.join(segment));
            dependencies.lock().insert(path);
        }
        Ok(source)
    }
}

impl CompiledTemplate for JinjaTemplate {
    fn render(&self, context: &serde_json::Value) -> Result<String, EngineError> {
        let template = self.env.get_template(&self.name)?;
        Ok(template.render(context)?)
    }
}

/// Template engine that compiles MiniJinja templates from disk.
///
/// Compiled templates are cached in memory by path. When `persist_compiled`
/// is on, the compiled source is also written to `<path><suffix>` and reused
/// by cold loads for as long as it is not older than the source.
pub struct JinjaEngine {
    cache: RwLock<HashMap<PathBuf, Arc<JinjaTemplate>>>,
    persist_compiled: bool,
    compiled_suffix: String,
}

impl JinjaEngine {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            persist_compiled: true,
            compiled_suffix: DEFAULT_COMPILED_SUFFIX.to_string(),
        }
    }

    /// Enable or disable writing compiled artifacts next to sources.
    pub fn persist_compiled(mut self, persist: bool) -> Self {
        self.persist_compiled = persist;
        self
    }

    pub fn with_compiled_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.compiled_suffix = suffix.into();
        self
    }

    /// Number of templates currently compiled.
    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }

    /// Read the compiled artifact when it is at least as new as the source.
    fn read_fresh_artifact(source: &Path, artifact: &Path) -> Option<String> {
        let modified = |p: &Path| -> Option<SystemTime> { std::fs::metadata(p).ok()?.modified().ok() };
        let source_time = modified(source)?;
        let artifact_time = modified(artifact)?;
        if artifact_time < source_time {
            return None;
        }
        std::fs::read_to_string(artifact).ok()
    }

    fn compile(&self, path: &Path) -> Result<JinjaTemplate, EngineError> {
        let artifact = compiled_artifact_path(path, &self.compiled_suffix);

        let (source, from_artifact) = match Self::read_fresh_artifact(path, &artifact) {
            Some(source) => (source, true),
            None => {
                let source = std::fs::read_to_string(path).map_err(|source| EngineError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                (source, false)
            }
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let dependencies = Arc::new(Mutex::new(HashSet::new()));
        let mut env = Environment::new();
        if let Some(dir) = path.parent() {
            env.set_loader(recording_loader(dir.to_path_buf(), dependencies.clone()));
        }
        env.add_template_owned(name.clone(), source.clone())?;

        if self.persist_compiled && !from_artifact {
            if let Err(e) = std::fs::write(&artifact, &source) {
                crate::warn_event!("engine", "artifact not written", "{}: {e}", artifact.display());
            }
        }

        crate::debug_event!(
            "engine",
            "compiled",
            "{}{}",
            path.display(),
            if from_artifact { " (artifact)" } else { "" }
        );

        Ok(JinjaTemplate {
            name,
            env,
            dependencies,
        })
    }
}

impl Default for JinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for JinjaEngine {
    fn load(&self, path: &Path) -> Result<Arc<dyn CompiledTemplate>, EngineError> {
        if let Some(hit) = self.cache.read().get(path) {
            return Ok(hit.clone());
        }

        let compiled = Arc::new(self.compile(path)?);
        self.cache
            .write()
            .insert(path.to_path_buf(), compiled.clone());
        Ok(compiled)
    }

    /// Drop `path` and every cached template that loaded it.
    fn invalidate(&self, path: &Path) {
        let mut cache = self.cache.write();
        let before = cache.len();
        cache.retain(|key, template| key != path && !template.depends_on(path));
        let dropped = before - cache.len();
        if dropped > 0 {
            crate::debug_event!(
                "engine",
                "invalidated",
                "{} ({dropped} cached)",
                path.display()
            );
        }
    }

    fn dependencies(&self, path: &Path) -> Vec<PathBuf> {
        self.cache
            .read()
            .get(path)
            .map(|template| template.dependencies())
            .unwrap_or_default()
    }

    fn compiled_suffix(&self) -> &str {
        &self.compiled_suffix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn render(engine: &JinjaEngine, path: &Path, ctx: serde_json::Value) -> String {
        engine.load(path).unwrap().render(&ctx).unwrap()
    }

    #[test]
    fn test_load_and_render() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello.jinja");
        fs::write(&path, "Hello {{ name }}").unwrap();

        let engine = JinjaEngine::new();
        assert_eq!(render(&engine, &path, json!({"name": "world"})), "Hello world");
        assert_eq!(engine.cached_count(), 1);
    }

    #[test]
    fn test_cache_serves_until_invalidated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.jinja");
        fs::write(&path, "v1").unwrap();

        let engine = JinjaEngine::new().persist_compiled(false);
        assert_eq!(render(&engine, &path, json!({})), "v1");

        fs::write(&path, "v2").unwrap();
        assert_eq!(render(&engine, &path, json!({})), "v1");

        engine.invalidate(&path);
        assert_eq!(render(&engine, &path, json!({})), "v2");
    }

    #[test]
    fn test_persists_compiled_artifact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.jinja");
        fs::write(&path, "{{ 1 + 1 }}").unwrap();

        let engine = JinjaEngine::new();
        assert_eq!(render(&engine, &path, json!({})), "2");

        let artifact = dir.path().join("page.jinja.compiled");
        assert_eq!(fs::read_to_string(artifact).unwrap(), "{{ 1 + 1 }}");
    }

    #[test]
    fn test_cold_load_prefers_fresh_artifact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.jinja");
        fs::write(&path, "source").unwrap();
        let artifact = dir.path().join("page.jinja.compiled");
        fs::write(&artifact, "artifact").unwrap();

        let engine = JinjaEngine::new();
        assert_eq!(render(&engine, &path, json!({})), "artifact");
    }

    #[test]
    fn test_stale_artifact_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.jinja");
        let artifact = dir.path().join("page.jinja.compiled");
        fs::write(&artifact, "stale").unwrap();
        fs::write(&path, "fresh").unwrap();

        let old = SystemTime::now() - Duration::from_secs(60);
        fs::File::options()
            .write(true)
            .open(&artifact)
            .unwrap()
            .set_modified(old)
            .unwrap();

        let engine = JinjaEngine::new();
        assert_eq!(render(&engine, &path, json!({})), "fresh");
        // Rewritten from the fresh source
        assert_eq!(fs::read_to_string(&artifact).unwrap(), "fresh");
    }

    #[test]
    fn test_missing_template_is_read_error() {
        let dir = TempDir::new().unwrap();
        let engine = JinjaEngine::new();
        let err = engine.load(&dir.path().join("nope.jinja")).err().unwrap();
        assert!(matches!(err, EngineError::Read { .. }));
    }

    #[test]
    fn test_syntax_error_is_template_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.jinja");
        fs::write(&path, "{% if %}").unwrap();

        let engine = JinjaEngine::new();
        let err = engine.load(&path).err().unwrap();
        assert!(matches!(err, EngineError::Template(_)));
        assert_eq!(engine.cached_count(), 0);
    }

    #[test]
    fn test_includes_resolve_next_to_template() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("header.jinja"), "<h1>{{ title }}</h1>").unwrap();
        let path = dir.path().join("page.jinja");
        fs::write(&path, "{% include 'header.jinja' %}body").unwrap();

        let engine = JinjaEngine::new().persist_compiled(false);
        assert_eq!(
            render(&engine, &path, json!({"title": "Hi"})),
            "<h1>Hi</h1>body"
        );
    }

    #[test]
    fn test_editing_include_invalidates_includers() {
        let dir = TempDir::new().unwrap();
        let header = dir.path().join("header.jinja");
        fs::write(&header, "H1").unwrap();
        let page = dir.path().join("page.jinja");
        fs::write(&page, "{% include 'header.jinja' %}|page").unwrap();
        let other = dir.path().join("other.jinja");
        fs::write(&other, "other").unwrap();

        let engine = JinjaEngine::new().persist_compiled(false);
        assert_eq!(render(&engine, &page, json!({})), "H1|page");
        render(&engine, &other, json!({}));
        assert_eq!(engine.dependencies(&page), vec![header.clone()]);

        fs::write(&header, "H2").unwrap();
        engine.invalidate(&header);

        assert_eq!(render(&engine, &page, json!({})), "H2|page");
        // Templates that never loaded the header stay cached
        assert_eq!(engine.cached_count(), 2);
        assert!(engine.dependencies(&other).is_empty());
    }

    #[test]
    fn test_nested_includes_are_tracked() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("partials")).unwrap();
        let nav = dir.path().join("partials/nav.jinja");
        fs::write(&nav, "nav1").unwrap();
        fs::write(
            dir.path().join("partials/header.jinja"),
            "[{% include 'partials/nav.jinja' %}]",
        )
        .unwrap();
        let page = dir.path().join("page.jinja");
        fs::write(&page, "{% include 'partials/header.jinja' %}").unwrap();

        let engine = JinjaEngine::new().persist_compiled(false);
        assert_eq!(render(&engine, &page, json!({})), "[nav1]");
        assert_eq!(
            engine.dependencies(&page),
            vec![dir.path().join("partials/header.jinja"), nav.clone()]
        );

        fs::write(&nav, "nav2").unwrap();
        engine.invalidate(&nav);
        assert_eq!(render(&engine, &page, json!({})), "[nav2]");
    }

    #[test]
    fn test_custom_suffix() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.jinja");
        fs::write(&path, "x").unwrap();

        let engine = JinjaEngine::new().with_compiled_suffix(".cache");
        assert_eq!(engine.compiled_suffix(), ".cache");
        render(&engine, &path, json!({}));
        assert!(dir.path().join("page.jinja.cache").exists());
    }
}
