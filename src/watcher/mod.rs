//! Hot reload file watching.
//!
//! # Architecture
//!
//! ```text
//! WatchRegistry (cloneable handle)
//!   - PathRegistry: directory -> filename -> Subscription
//!   - WatchBackend: one subscription per file (notify by default)
//!         |
//!   ChangeSender (unbounded mpsc)
//!         |
//! EventLoop task
//!   - Debouncer: one deadline per file
//!   - on deadline: remove compiled artifact, engine.invalidate(path)
//! ```

mod backend;
mod debouncer;
mod error;
mod path_registry;
mod registry;

pub use backend::{ChangeSender, NotifyBackend, Subscription, WatchBackend};
pub use debouncer::Debouncer;
pub use error::WatchError;
pub use path_registry::{DirectoryWatch, PathRegistry};
pub use registry::{DEFAULT_DELAY_MS, ErrorHook, WatchRegistry, WatchRegistryBuilder};
