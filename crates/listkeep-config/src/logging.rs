//! Logging initialization.
//!
//! Thin wrapper over the observability crate so every binary configures
//! logging the same way: JSONL to `~/.listkeep/logs/dev.jsonl`, optional
//! stderr, level from `RUST_LOG` or the configured default.

use crate::Paths;

/// Initialize logging for a listkeep service.
///
/// # Example
///
/// ```ignore
/// init_logging("cli", "info", &paths, false);
/// tracing::info!("started");
/// ```
pub fn init_logging(service_name: &str, level: &str, paths: &Paths, also_stderr: bool) {
    observability::init_with_config(observability::LogConfig {
        service_name: service_name.into(),
        default_level: parse_level(level).as_str().to_ascii_lowercase(),
        log_path: Some(paths.log_file()),
        also_stderr,
    });
}

/// Parse a log level string into a tracing Level. Unknown values map to INFO.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
