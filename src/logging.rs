//! # Logging
//!
//! Ambient tracing setup plus the debug-level-rotate hook consumed by the
//! administrative signal glue. The level order mirrors the original debug
//! facility: error → info → debug → trace, wrapping back to error, with
//! info as the starting level.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

const LEVELS: [&str; 4] = ["error", "info", "debug", "trace"];
const INITIAL_LEVEL: usize = 1;

static RELOAD: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();
static CURRENT: AtomicUsize = AtomicUsize::new(INITIAL_LEVEL);

/// Installs the subscriber: stderr fmt layer behind a reloadable filter.
/// `RUST_LOG` overrides the starting level. Safe to call more than once;
/// later calls keep the first subscriber.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(LEVELS[INITIAL_LEVEL]));
    let (filter, handle) = reload::Layer::new(filter);

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok();

    if installed {
        let _ = RELOAD.set(handle);
    }
}

/// Advances the log level one step (error → info → debug → trace) or wraps
/// back to error at the top. A no-op when [`init`] never installed the
/// subscriber.
pub fn rotate_level() {
    let next = (CURRENT.load(Ordering::Relaxed) + 1) % LEVELS.len();
    CURRENT.store(next, Ordering::Relaxed);

    if let Some(handle) = RELOAD.get() {
        if handle.reload(EnvFilter::new(LEVELS[next])).is_ok() {
            info!(level = LEVELS[next], "log level rotated");
        }
    }
}
