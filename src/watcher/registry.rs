//! Watch registry with a debounced invalidation loop.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::engine::{TemplateEngine, compiled_artifact_path};

use super::backend::{ChangeSender, NotifyBackend, WatchBackend, WatchMessage};
use super::debouncer::Debouncer;
use super::error::WatchError;
use super::path_registry::PathRegistry;

/// Callback receiving errors that the registry absorbs.
pub type ErrorHook = Arc<dyn Fn(&WatchError) + Send + Sync>;

/// Default debounce delay in milliseconds.
pub const DEFAULT_DELAY_MS: u64 = 2500;

fn log_error_hook() -> ErrorHook {
    Arc::new(|err: &WatchError| {
        crate::debug_event!("watcher", "ignored error", "{err}");
    })
}

/// State shared between registry handles and the event loop.
struct Shared {
    paths: Mutex<PathRegistry>,
    on_error: ErrorHook,
}

struct Inner {
    shared: Arc<Shared>,
    backend: Box<dyn WatchBackend>,
    base_dir: Option<PathBuf>,
    events: ChangeSender,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.shared.paths.lock().clear();
    }
}

/// Tracks watched template files and invalidates them after they change.
///
/// Registration is idempotent: a file is subscribed to at most once, and a
/// file has at most one pending invalidation. Change events restart the
/// file's debounce clock; once it has been quiet for the configured delay the
/// compiled artifact next to it is deleted and the engine is told to forget
/// the template.
///
/// Handles are cheap to clone. The registry is torn down by [`close`] or when
/// the last handle is dropped.
///
/// [`close`]: WatchRegistry::close
#[derive(Clone)]
pub struct WatchRegistry {
    inner: Arc<Inner>,
}

impl WatchRegistry {
    /// Create a builder for a registry invalidating templates in `engine`.
    pub fn builder(engine: Arc<dyn TemplateEngine>) -> WatchRegistryBuilder {
        WatchRegistryBuilder::new(engine)
    }

    /// Start watching `path`.
    ///
    /// Returns `Ok(false)` when the file is already watched. The path is made
    /// absolute without touching the filesystem.
    pub fn register_file(&self, path: impl AsRef<Path>) -> Result<bool, WatchError> {
        if self.is_closed() {
            return Err(WatchError::ChannelClosed);
        }

        let path = std::path::absolute(path.as_ref()).map_err(|e| WatchError::PathWatchFailed {
            path: path.as_ref().to_path_buf(),
            reason: e.to_string(),
        })?;

        // Held across subscribe so concurrent registrations of one file
        // cannot both subscribe.
        let mut paths = self.inner.shared.paths.lock();
        if paths.contains(&path) {
            return Ok(false);
        }

        let subscription = self.inner.backend.subscribe(&path, self.inner.events.clone())?;
        paths.insert(&path, subscription);
        crate::debug_event!("watcher", "watching", "{}", path.display());
        Ok(true)
    }

    /// Expand `pattern` and register every matching file.
    ///
    /// Relative patterns are anchored at the registry's base directory.
    /// Expansion failures register nothing and go to the error hook. Returns
    /// the number of newly registered files.
    pub async fn register_glob(&self, pattern: &str) -> usize {
        let anchored = self.anchor(pattern);
        let expanded = tokio::task::spawn_blocking({
            let anchored = anchored.clone();
            move || expand_glob(&anchored)
        })
        .await;

        let matches = match expanded {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                self.report(&e);
                return 0;
            }
            Err(e) => {
                self.report(&WatchError::GlobFailed {
                    pattern: anchored,
                    reason: e.to_string(),
                });
                return 0;
            }
        };

        let mut added = 0;
        for path in matches {
            match self.register_file(&path) {
                Ok(true) => added += 1,
                Ok(false) => {}
                Err(e) => self.report(&e),
            }
        }

        crate::debug_event!("watcher", "glob", "{pattern}: {added} new files");
        added
    }

    /// Run [`register_glob`](Self::register_glob) in the background.
    pub fn spawn_register_glob(&self, pattern: impl Into<String>) -> JoinHandle<usize> {
        let registry = self.clone();
        let pattern = pattern.into();
        tokio::spawn(async move { registry.register_glob(&pattern).await })
    }

    /// Stop watching `path` and drop its pending invalidation.
    pub fn unregister_file(&self, path: impl AsRef<Path>) -> bool {
        let Ok(path) = std::path::absolute(path.as_ref()) else {
            return false;
        };
        let removed = self.inner.shared.paths.lock().remove(&path);
        if removed.is_some() {
            self.inner.events.forget(path);
        }
        removed.is_some()
    }

    /// Whether `path` is currently watched.
    pub fn is_registered(&self, path: impl AsRef<Path>) -> bool {
        std::path::absolute(path.as_ref())
            .map(|p| self.inner.shared.paths.lock().contains(&p))
            .unwrap_or(false)
    }

    /// All watched files.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.inner.shared.paths.lock().paths()
    }

    pub fn watched_count(&self) -> usize {
        self.inner.shared.paths.lock().path_count()
    }

    /// Hand an absorbed error to the error hook.
    pub fn report(&self, err: &WatchError) {
        (self.inner.shared.on_error)(err);
    }

    /// Stop the event loop and release every subscription.
    pub fn close(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        self.inner.shutdown.cancel();
        self.inner.shared.paths.lock().clear();
        crate::debug_event!("watcher", "closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Wait for the event loop to finish after [`close`](Self::close).
    pub async fn join(&self) {
        let task = self.inner.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    fn anchor(&self, pattern: &str) -> String {
        match &self.inner.base_dir {
            Some(base) if !Path::new(pattern).is_absolute() => {
                let base = glob::Pattern::escape(&base.to_string_lossy());
                format!("{}/{pattern}", base.trim_end_matches('/'))
            }
            _ => pattern.to_string(),
        }
    }
}

fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>, WatchError> {
    let entries = glob::glob(pattern).map_err(|e| WatchError::GlobFailed {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    Ok(entries
        .filter_map(Result::ok)
        .filter(|path| path.is_file())
        .collect())
}

/// Builder for constructing a [`WatchRegistry`].
pub struct WatchRegistryBuilder {
    engine: Arc<dyn TemplateEngine>,
    backend: Box<dyn WatchBackend>,
    on_error: ErrorHook,
    base_dir: Option<PathBuf>,
    delay_ms: u64,
}

impl WatchRegistryBuilder {
    fn new(engine: Arc<dyn TemplateEngine>) -> Self {
        Self {
            engine,
            backend: Box::new(NotifyBackend::new()),
            on_error: log_error_hook(),
            base_dir: None,
            delay_ms: DEFAULT_DELAY_MS,
        }
    }

    /// Set the debounce delay in milliseconds.
    pub fn delay_ms(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Replace the file subscription backend.
    pub fn backend(self, backend: impl WatchBackend + 'static) -> Self {
        self.boxed_backend(Box::new(backend))
    }

    pub fn boxed_backend(mut self, backend: Box<dyn WatchBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Receive errors the registry would otherwise only log.
    pub fn on_error(mut self, hook: impl Fn(&WatchError) + Send + Sync + 'static) -> Self {
        self.on_error = Arc::new(hook);
        self
    }

    /// Directory relative glob patterns are anchored at.
    pub fn base_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.base_dir = dir;
        self
    }

    /// Spawn the event loop on the current tokio runtime.
    pub fn start(self) -> Result<WatchRegistry, WatchError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| WatchError::InitFailed {
            reason: e.to_string(),
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            paths: Mutex::new(PathRegistry::new()),
            on_error: self.on_error,
        });
        let shutdown = CancellationToken::new();

        let event_loop = EventLoop {
            shared: shared.clone(),
            engine: self.engine,
            debouncer: Debouncer::new(self.delay_ms),
            rx,
            shutdown: shutdown.clone(),
        };
        let task = runtime.spawn(event_loop.run());

        crate::debug_event!("watcher", "started", "delay {}ms", self.delay_ms);

        Ok(WatchRegistry {
            inner: Arc::new(Inner {
                shared,
                backend: self.backend,
                base_dir: self.base_dir,
                events: ChangeSender::new(tx),
                shutdown,
                task: Mutex::new(Some(task)),
            }),
        })
    }
}

/// Owns the pending invalidations; the only place they are mutated.
struct EventLoop {
    shared: Arc<Shared>,
    engine: Arc<dyn TemplateEngine>,
    debouncer: Debouncer,
    rx: mpsc::UnboundedReceiver<WatchMessage>,
    shutdown: CancellationToken,
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl EventLoop {
    async fn run(mut self) {
        loop {
            let deadline = self.debouncer.next_deadline();

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break,

                msg = self.rx.recv() => match msg {
                    Some(msg) => self.handle_message(msg),
                    None => break,
                },

                _ = sleep_until_deadline(deadline) => {
                    for path in self.debouncer.take_ready() {
                        self.invalidate(&path).await;
                    }
                }
            }
        }

        self.debouncer.clear();
        crate::debug_event!("watcher", "stopped");
    }

    fn handle_message(&mut self, msg: WatchMessage) {
        match msg {
            WatchMessage::Changed(path) => {
                if !self.shared.paths.lock().contains(&path) {
                    crate::debug_event!("watcher", "unmatched", "{}", path.display());
                    return;
                }
                let replaced = self.debouncer.record(path.clone());
                crate::debug_event!(
                    "watcher",
                    if replaced { "rescheduled" } else { "scheduled" },
                    "{}",
                    path.display()
                );
            }
            WatchMessage::Forget(path) => {
                self.debouncer.remove(&path);
            }
            WatchMessage::Failed(err) => {
                (self.shared.on_error)(&err);
            }
        }
    }

    /// Delete the stale compiled artifact, then tell the engine.
    async fn invalidate(&self, path: &Path) {
        let artifact = compiled_artifact_path(path, self.engine.compiled_suffix());
        match tokio::fs::remove_file(&artifact).await {
            Ok(()) => {
                crate::debug_event!("watcher", "removed", "{}", artifact.display());
            }
            // Not compiled yet
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                (self.shared.on_error)(&WatchError::ArtifactRemoval {
                    path: artifact,
                    reason: e.to_string(),
                });
            }
        }

        self.engine.invalidate(path);
        crate::log_event!("watcher", "invalidated", "{}", path.display());
    }
}
