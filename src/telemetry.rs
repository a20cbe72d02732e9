//! Telemetry and observability setup
//!
//! Configures structured logging with tracing and tracing-subscriber. The
//! filter sits behind a reload layer so `/debug` can raise verbosity at runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing_subscriber::{
    EnvFilter, Registry, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

static CONTROL: OnceLock<Arc<LogControl>> = OnceLock::new();

const DEBUG_DIRECTIVES: &str = "rever=debug,tower_http=debug";

/// Runtime switch between the configured log filter and debug logging
#[derive(Debug)]
pub struct LogControl {
    handle: Option<reload::Handle<EnvFilter, Registry>>,
    base_directives: String,
    debug: AtomicBool,
}

impl LogControl {
    /// A control not attached to any subscriber; only tracks the flag
    pub fn detached() -> Self {
        Self {
            handle: None,
            base_directives: String::new(),
            debug: AtomicBool::new(false),
        }
    }

    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    /// Switch debug logging on or off
    ///
    /// # Errors
    ///
    /// Returns the reload error if the subscriber has gone away.
    pub fn set_debug(&self, enabled: bool) -> Result<(), reload::Error> {
        if let Some(handle) = &self.handle {
            let directives = if enabled {
                DEBUG_DIRECTIVES
            } else {
                self.base_directives.as_str()
            };
            handle.reload(EnvFilter::new(directives))?;
        }
        self.debug.store(enabled, Ordering::Relaxed);
        tracing::info!(debug_mode = enabled, "Log level changed");
        Ok(())
    }
}

/// Initialize the tracing subscriber for structured logging
///
/// Only the first call installs a subscriber; later calls return the same
/// control. RUST_LOG, when set, replaces the configured default level.
///
/// # Examples
///
/// ```no_run
/// let logs = rever::telemetry::init("info");
/// tracing::info!("Application started");
/// logs.set_debug(true).ok();
/// ```
pub fn init(default_level: &str) -> Arc<LogControl> {
    CONTROL
        .get_or_init(|| {
            let base_directives = std::env::var(EnvFilter::DEFAULT_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| format!("rever={},tower_http=info", default_level));

            let (filter, handle) = reload::Layer::new(EnvFilter::new(&base_directives));

            let installed = tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init()
                .is_ok();

            Arc::new(LogControl {
                handle: installed.then_some(handle),
                base_directives,
                debug: AtomicBool::new(false),
            })
        })
        .clone()
}
