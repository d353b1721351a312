//! Logging and tracing setup for rigbake
//!
//! Structured logging goes through the `tracing` crate. Binaries call
//! [`init_with_config`] once at startup; library code only emits events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::Level;

/// Whether tracing has been initialized
static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default log level filter (e.g., "info", "debug", "warn")
    pub default_level: String,
    /// Show the target (module path) in log output
    pub show_target: bool,
    /// Show thread IDs in log output
    pub show_thread_ids: bool,
    /// Show source file in log output
    pub show_file: bool,
    /// Show line number in log output
    pub show_line_number: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: "warn,rigbake=info".to_string(),
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
        }
    }
}

impl TracingConfig {
    /// Map a `-v` count onto a filter and output detail
    pub fn from_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };

        Self {
            default_level: level.as_str().to_ascii_lowercase(),
            show_target: verbosity >= 2,
            show_thread_ids: verbosity >= 3,
            show_file: verbosity >= 3,
            show_line_number: verbosity >= 3,
        }
    }
}

/// Initialize tracing with a custom configuration
///
/// `RUST_LOG` takes precedence over `config.default_level`.
pub fn init_with_config(config: TracingConfig) {
    if TRACING_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
        .is_ok()
    {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.default_level));

        let fmt_layer = fmt::layer()
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_file)
            .with_line_number(config.show_line_number);

        // Another subscriber may already be installed by an embedding tool
        let _ = tracing_subscriber::registry()
            .with(fmt_layer)
            .with(filter)
            .try_init();
    }
}

/// Run one pipeline stage inside an `info` span and log how long it took
pub fn instrument_stage<T, F>(name: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    let span = tracing::info_span!("stage", stage = %name);
    let _guard = span.enter();

    let start = Instant::now();
    let result = f();
    let duration = start.elapsed();

    tracing::debug!(duration_ms = %duration.as_millis(), "Stage complete");

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_config_default() {
        let config = TracingConfig::default();
        assert!(config.default_level.contains("rigbake=info"));
        assert!(config.show_target);
        assert!(!config.show_thread_ids);
    }

    #[test]
    fn test_from_verbosity() {
        assert_eq!(TracingConfig::from_verbosity(0).default_level, "warn");
        assert_eq!(TracingConfig::from_verbosity(2).default_level, "debug");

        let loud = TracingConfig::from_verbosity(5);
        assert_eq!(loud.default_level, "trace");
        assert!(loud.show_line_number);
    }

    #[test]
    fn test_instrument_stage() {
        let result = instrument_stage("test", || 42);
        assert_eq!(result, 42);
    }
}
