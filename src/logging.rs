//! Log output for the watcher, engine and server.
//!
//! Every message carries a `[component]` prefix so a hot-reload session reads
//! as a timeline:
//!
//! ```text
//! 14:02:11.305  INFO hotview::watcher::registry: [watcher] invalidated: /srv/views/page.jinja
//! 14:02:11.402 DEBUG hotview::engine::jinja: [engine] compiled: /srv/views/page.jinja
//! ```
//!
//! Components: `watcher` (subscriptions, debounce, invalidation), `engine`
//! (compilation and artifacts), `views` (setup), `http` (preview server).
//!
//! Levels come from `[logging]` in `hotview.toml`, keyed by module path:
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! "hotview::watcher" = "info"   # one line per invalidation
//! "hotview::engine" = "debug"   # every compile
//! ```
//!
//! `RUST_LOG` replaces the configured filter entirely:
//! `RUST_LOG=hotview=debug hotview serve --watch`.

use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Wall-clock `HH:MM:SS.mmm`; dates add nothing to a dev session.
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// `default,module=level,...` with modules in a stable order.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();
    modules
        .into_iter()
        .fold(config.default.clone(), |mut filter, (module, level)| {
            filter.push_str(&format!(",{module}={level}"));
            filter
        })
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(filter_directives(config))
    }
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed, by an earlier
/// call or by the host application; the existing one is left alone.
pub fn init_with_config(config: &LoggingConfig) -> bool {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_timer(CompactTime)
        .with_level(true)
        .with_filter(env_filter(config));

    tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .is_ok()
}

/// Install the global subscriber with the default `warn` filter.
pub fn init() -> bool {
    init_with_config(&LoggingConfig::default())
}

/// Info-level event: `log_event!("watcher", "invalidated", "{}", path.display())`.
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Debug-level event, for per-file chatter such as scheduling and compiles.
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Warn-level event for failures that are absorbed rather than returned.
#[macro_export]
macro_rules! warn_event {
    ($component:expr, $event:expr) => {
        tracing::warn!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::warn!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}
