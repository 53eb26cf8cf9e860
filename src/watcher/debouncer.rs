//! Per-file debounce deadlines.
//!
//! Debouncing collapses a burst of saves (auto-save, formatter passes) into a
//! single invalidation once the file has been quiet for the configured delay.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::time::{Duration, Instant};

/// Debounces file change events by path.
///
/// Each path owns at most one deadline; recording a change replaces it, so
/// the clock restarts from the latest event.
#[derive(Debug)]
pub struct Debouncer {
    /// Pending invalidations: path -> deadline.
    pending: HashMap<PathBuf, Instant>,
    /// How long a file must be quiet before it is ready.
    duration: Duration,
}

impl Debouncer {
    /// Create a new debouncer with the given duration in milliseconds.
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            pending: HashMap::new(),
            duration: Duration::from_millis(debounce_ms),
        }
    }

    /// Record a file change event.
    ///
    /// Returns `true` when an earlier pending deadline was replaced.
    pub fn record(&mut self, path: PathBuf) -> bool {
        self.pending
            .insert(path, Instant::now() + self.duration)
            .is_some()
    }

    /// Drop the pending deadline for a path.
    pub fn remove(&mut self, path: &Path) -> bool {
        self.pending.remove(path).is_some()
    }

    /// Take all paths whose deadline has passed.
    pub fn take_ready(&mut self) -> Vec<PathBuf> {
        let now = Instant::now();
        let mut ready = Vec::new();

        self.pending.retain(|path, deadline| {
            if *deadline <= now {
                ready.push(path.clone());
                false
            } else {
                true
            }
        });

        ready
    }

    /// Earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_basic() {
        let mut debouncer = Debouncer::new(50);

        let path = PathBuf::from("/test/file.jinja");
        assert!(!debouncer.record(path.clone()));

        // Immediately after, nothing should be ready
        assert!(debouncer.take_ready().is_empty());
        assert!(debouncer.has_pending());

        advance(Duration::from_millis(50)).await;

        let ready = debouncer.take_ready();
        assert_eq!(ready, vec![path]);
        assert!(!debouncer.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_resets_on_new_change() {
        let mut debouncer = Debouncer::new(50);

        let path = PathBuf::from("/test/file.jinja");
        debouncer.record(path.clone());

        advance(Duration::from_millis(30)).await;

        // Record again - resets the deadline
        assert!(debouncer.record(path.clone()));
        assert_eq!(debouncer.pending_count(), 1);

        // 60ms after the first change, 30ms after the second
        advance(Duration::from_millis(30)).await;
        assert!(debouncer.take_ready().is_empty());

        advance(Duration::from_millis(20)).await;
        assert_eq!(debouncer.take_ready().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_multiple_files() {
        let mut debouncer = Debouncer::new(50);

        let path1 = PathBuf::from("/test/a.jinja");
        let path2 = PathBuf::from("/test/b.jinja");

        debouncer.record(path1.clone());
        advance(Duration::from_millis(30)).await;
        debouncer.record(path2.clone());

        assert_eq!(
            debouncer.next_deadline(),
            Some(Instant::now() + Duration::from_millis(20))
        );

        advance(Duration::from_millis(25)).await;
        assert_eq!(debouncer.take_ready(), vec![path1]);
        assert!(debouncer.has_pending());

        advance(Duration::from_millis(30)).await;
        assert_eq!(debouncer.take_ready(), vec![path2]);
        assert_eq!(debouncer.next_deadline(), None);
    }

    #[test]
    fn test_debouncer_remove() {
        let mut debouncer = Debouncer::new(50);

        let path = PathBuf::from("/test/file.jinja");
        debouncer.record(path.clone());
        assert!(debouncer.has_pending());

        assert!(debouncer.remove(&path));
        assert!(!debouncer.remove(&path));
        assert!(!debouncer.has_pending());
    }
}
