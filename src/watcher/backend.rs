//! File subscriptions.
//!
//! A [`WatchBackend`] turns a file path into a live [`Subscription`] that
//! reports changes through a [`ChangeSender`]. Dropping the subscription
//! releases the underlying OS watch.
//!
//! [`NotifyBackend`] keeps a single notify watcher per backend and adds one
//! non-recursive watch per file to it, so a large template tree does not
//! exhaust per-user watcher instances (`fs.inotify.max_user_instances`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::error::WatchError;

/// Messages consumed by the registry's event loop.
#[derive(Debug)]
pub(crate) enum WatchMessage {
    Changed(PathBuf),
    Failed(WatchError),
    Forget(PathBuf),
}

/// Handle a subscription uses to report changes to its registry.
#[derive(Clone, Debug)]
pub struct ChangeSender {
    tx: mpsc::UnboundedSender<WatchMessage>,
}

impl ChangeSender {
    pub(crate) fn new(tx: mpsc::UnboundedSender<WatchMessage>) -> Self {
        Self { tx }
    }

    /// Report a change to `path`. Returns `false` once the registry is gone.
    pub fn changed(&self, path: impl Into<PathBuf>) -> bool {
        self.tx.send(WatchMessage::Changed(path.into())).is_ok()
    }

    /// Report a backend error.
    pub fn failed(&self, error: WatchError) -> bool {
        self.tx.send(WatchMessage::Failed(error)).is_ok()
    }

    pub(crate) fn forget(&self, path: PathBuf) -> bool {
        self.tx.send(WatchMessage::Forget(path)).is_ok()
    }
}

/// A live watch on a single file.
pub trait Subscription: Send {
    /// The file this subscription watches.
    fn path(&self) -> &Path;
}

/// Creates single-file subscriptions.
pub trait WatchBackend: Send + Sync {
    fn subscribe(
        &self,
        path: &Path,
        events: ChangeSender,
    ) -> Result<Box<dyn Subscription>, WatchError>;
}

/// Where events for one watched file are delivered.
struct Route {
    /// The path as registered, reported back regardless of how the platform
    /// spells it (e.g. canonicalized temp dirs on macOS).
    path: PathBuf,
    events: ChangeSender,
}

type Routes = Arc<Mutex<HashMap<PathBuf, Route>>>;

#[derive(Default)]
struct NotifyShared {
    /// Created on first subscribe.
    watcher: Mutex<Option<RecommendedWatcher>>,
    routes: Routes,
}

/// Backend sharing one `notify::RecommendedWatcher` across all files.
///
/// Every file is added to that watcher with its own non-recursive watch, so
/// the OS sees one subscription per file but only one watcher instance.
#[derive(Clone, Default)]
pub struct NotifyBackend {
    shared: Arc<NotifyShared>,
}

impl NotifyBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files currently watched through this backend.
    pub fn watch_count(&self) -> usize {
        let routes = self.shared.routes.lock();
        let mut registered: Vec<&Path> = routes.values().map(|r| r.path.as_path()).collect();
        registered.sort();
        registered.dedup();
        registered.len()
    }
}

struct NotifySubscription {
    path: PathBuf,
    /// Extra routing keys, e.g. the canonical spelling of `path`.
    aliases: Vec<PathBuf>,
    shared: Arc<NotifyShared>,
}

impl Subscription for NotifySubscription {
    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for NotifySubscription {
    fn drop(&mut self) {
        // Never hold the routes lock here: unwatch waits on the thread that
        // runs the event callback, which takes that lock.
        if let Some(watcher) = self.shared.watcher.lock().as_mut() {
            let _ = watcher.unwatch(&self.path);
        }
        let mut routes = self.shared.routes.lock();
        routes.remove(&self.path);
        for alias in &self.aliases {
            routes.remove(alias);
        }
    }
}

/// Whether an event kind counts as a change to the file.
fn is_change(kind: &EventKind) -> bool {
    !matches!(kind, EventKind::Access(_))
}

fn dispatch(routes: &Routes, res: notify::Result<Event>) {
    match res {
        Ok(event) if is_change(&event.kind) => {
            let routes = routes.lock();
            for path in &event.paths {
                if let Some(route) = routes.get(path) {
                    let _ = route.events.changed(route.path.clone());
                }
            }
        }
        Ok(_) => {}
        Err(e) => {
            let routes = routes.lock();
            let route = e
                .paths
                .iter()
                .find_map(|p| routes.get(p))
                .or_else(|| routes.values().next());
            if let Some(route) = route {
                let _ = route.events.failed(WatchError::EventError {
                    details: e.to_string(),
                });
            }
        }
    }
}

impl WatchBackend for NotifyBackend {
    fn subscribe(
        &self,
        path: &Path,
        events: ChangeSender,
    ) -> Result<Box<dyn Subscription>, WatchError> {
        let aliases: Vec<PathBuf> = std::fs::canonicalize(path)
            .ok()
            .filter(|canonical| canonical != path)
            .into_iter()
            .collect();

        {
            let mut routes = self.shared.routes.lock();
            for key in std::iter::once(path).chain(aliases.iter().map(PathBuf::as_path)) {
                routes.insert(
                    key.to_path_buf(),
                    Route {
                        path: path.to_path_buf(),
                        events: events.clone(),
                    },
                );
            }
        }

        // Constructed before the watch so a failure unroutes the path again.
        let subscription = NotifySubscription {
            path: path.to_path_buf(),
            aliases,
            shared: self.shared.clone(),
        };

        let mut guard = self.shared.watcher.lock();
        if guard.is_none() {
            let routes = self.shared.routes.clone();
            let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
                dispatch(&routes, res)
            })?;
            *guard = Some(watcher);
        }
        let Some(watcher) = guard.as_mut() else {
            return Err(WatchError::InitFailed {
                reason: "watcher unavailable".to_string(),
            });
        };

        let watched = watcher.watch(path, RecursiveMode::NonRecursive);
        drop(guard);
        watched.map_err(|e| WatchError::PathWatchFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(Box::new(subscription))
    }
}
