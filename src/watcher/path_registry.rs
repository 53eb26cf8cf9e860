//! Watched files indexed by directory, then filename.
//!
//! Each file owns its own subscription; the directory level exists for lookup
//! only and never carries an OS watch of its own.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::backend::Subscription;

/// Files watched inside one directory.
#[derive(Default)]
pub struct DirectoryWatch {
    files: HashMap<OsString, Box<dyn Subscription>>,
}

impl DirectoryWatch {
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

/// Registry of watched files.
#[derive(Default)]
pub struct PathRegistry {
    dirs: HashMap<PathBuf, DirectoryWatch>,
}

/// Split a path into the directory and filename it is indexed under.
///
/// Files at the root of a relative path live under `.`.
fn split(path: &Path) -> Option<(PathBuf, OsString)> {
    let name = path.file_name()?.to_os_string();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Some((parent, name))
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a file is registered.
    pub fn contains(&self, path: &Path) -> bool {
        split(path).is_some_and(|(dir, name)| {
            self.dirs
                .get(&dir)
                .is_some_and(|watch| watch.files.contains_key(&name))
        })
    }

    /// Record the subscription for a file, creating its directory entry on
    /// first use.
    ///
    /// Returns `false` (dropping `subscription`) when the file was already
    /// registered or the path has no filename.
    pub fn insert(&mut self, path: &Path, subscription: Box<dyn Subscription>) -> bool {
        let Some((dir, name)) = split(path) else {
            return false;
        };
        let watch = self.dirs.entry(dir).or_default();
        if watch.files.contains_key(&name) {
            return false;
        }
        watch.files.insert(name, subscription);
        true
    }

    /// Remove a file, returning its subscription.
    ///
    /// Empty directory entries are dropped along with their last file.
    pub fn remove(&mut self, path: &Path) -> Option<Box<dyn Subscription>> {
        let (dir, name) = split(path)?;
        let watch = self.dirs.get_mut(&dir)?;
        let subscription = watch.files.remove(&name);
        if watch.files.is_empty() {
            self.dirs.remove(&dir);
        }
        subscription
    }

    /// All registered file paths.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.dirs
            .iter()
            .flat_map(|(dir, watch)| watch.files.keys().map(move |name| dir.join(name)))
            .collect()
    }

    pub fn directory(&self, dir: &Path) -> Option<&DirectoryWatch> {
        self.dirs.get(dir)
    }

    pub fn path_count(&self) -> usize {
        self.dirs.values().map(DirectoryWatch::file_count).sum()
    }

    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    /// Drop every entry, releasing all subscriptions.
    pub fn clear(&mut self) {
        self.dirs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counted {
        path: PathBuf,
        live: Arc<AtomicUsize>,
    }

    impl Counted {
        fn boxed(path: &str, live: &Arc<AtomicUsize>) -> Box<dyn Subscription> {
            live.fetch_add(1, Ordering::SeqCst);
            Box::new(Counted {
                path: PathBuf::from(path),
                live: live.clone(),
            })
        }
    }

    impl Subscription for Counted {
        fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Drop for Counted {
        fn drop(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_path_registry_basic() {
        let live = Arc::new(AtomicUsize::new(0));
        let mut registry = PathRegistry::new();

        for path in ["/tpl/a.jinja", "/tpl/b.jinja", "/tpl/partials/c.jinja"] {
            assert!(registry.insert(Path::new(path), Counted::boxed(path, &live)));
        }

        assert_eq!(registry.path_count(), 3);
        assert_eq!(registry.dir_count(), 2);
        assert_eq!(
            registry.directory(Path::new("/tpl")).map(DirectoryWatch::file_count),
            Some(2)
        );
        assert!(registry.contains(Path::new("/tpl/a.jinja")));
        assert!(!registry.contains(Path::new("/tpl/partials/a.jinja")));
        assert!(!registry.contains(Path::new("/other/a.jinja")));

        let mut paths = registry.paths();
        paths.sort();
        assert_eq!(paths[0], PathBuf::from("/tpl/a.jinja"));
    }

    #[test]
    fn test_duplicate_insert_is_rejected() {
        let live = Arc::new(AtomicUsize::new(0));
        let mut registry = PathRegistry::new();

        let path = Path::new("/tpl/a.jinja");
        assert!(registry.insert(path, Counted::boxed("/tpl/a.jinja", &live)));
        assert!(!registry.insert(path, Counted::boxed("/tpl/a.jinja", &live)));

        // The rejected subscription was dropped
        assert_eq!(live.load(Ordering::SeqCst), 1);
        assert_eq!(registry.path_count(), 1);
    }

    #[test]
    fn test_remove_releases_subscription() {
        let live = Arc::new(AtomicUsize::new(0));
        let mut registry = PathRegistry::new();

        let path = Path::new("/tpl/a.jinja");
        registry.insert(path, Counted::boxed("/tpl/a.jinja", &live));

        let removed = registry.remove(path).expect("registered");
        assert_eq!(removed.path(), path);
        drop(removed);

        assert_eq!(live.load(Ordering::SeqCst), 0);
        assert!(!registry.contains(path));
        assert_eq!(registry.dir_count(), 0);
        assert!(registry.remove(path).is_none());
    }

    #[test]
    fn test_clear_releases_everything() {
        let live = Arc::new(AtomicUsize::new(0));
        let mut registry = PathRegistry::new();
        registry.insert(Path::new("/a/x.jinja"), Counted::boxed("/a/x.jinja", &live));
        registry.insert(Path::new("/b/y.jinja"), Counted::boxed("/b/y.jinja", &live));

        registry.clear();
        assert_eq!(live.load(Ordering::SeqCst), 0);
        assert_eq!(registry.path_count(), 0);
    }

    #[test]
    fn test_root_files() {
        let live = Arc::new(AtomicUsize::new(0));
        let mut registry = PathRegistry::new();

        registry.insert(Path::new("index.jinja"), Counted::boxed("index.jinja", &live));
        assert!(registry.directory(Path::new(".")).is_some());
        assert!(registry.contains(Path::new("index.jinja")));
    }
}
