//! Structured logging utilities for LooseDex components.
//!
//! Provides consistent logging with component prefixes and structured fields.
//!
//! # Usage
//!
//! ```ignore
//! use ldx_config::{log_cache_info, log_gate_debug};
//!
//! log_cache_info!("Cache loaded", entries = 1234);
//! log_gate_debug!("Waiting for initializer", spins = 10);
//! ```

use std::path::Path;

/// Component identifiers for log filtering
pub struct Component;

impl Component {
    pub const CACHE: &'static str = "CACHE";
    pub const LOCATION: &'static str = "LOCATION";
    pub const GATE: &'static str = "GATE";
}

/// Log levels for runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

// === CACHE logging macros ===

#[macro_export]
macro_rules! log_cache_error {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::error!(component = "CACHE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_cache_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "CACHE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_cache_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "CACHE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_cache_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "CACHE", $($key = $value,)* $msg)
    };
}

// === LOCATION logging macros ===

#[macro_export]
macro_rules! log_location_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "LOCATION", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_location_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "LOCATION", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_location_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "LOCATION", $($key = $value,)* $msg)
    };
}

// === GATE logging macros ===

#[macro_export]
macro_rules! log_gate_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "GATE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_gate_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "GATE", $($key = $value,)* $msg)
    };
}

/// Emit the framed timing block used by performance diagnostics.
pub fn log_performance_block(cached: bool, mode: &str, loose_file_count: usize, execution_ms: f64) {
    let title = if cached {
        "Cache Performance"
    } else {
        "Native Performance"
    };
    tracing::info!("========== {} ==========", title);
    tracing::info!("Mode: {}", mode);
    tracing::info!("Loose file count: {}", loose_file_count);
    tracing::info!("Execution time: {:.3} ms", execution_ms);
    tracing::info!("========================================");
}

fn env_filter(level: LogLevel) -> tracing_subscriber::EnvFilter {
    use tracing_subscriber::EnvFilter;

    EnvFilter::try_from_env("LDX_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()))
}

/// Initialize stderr logging with the given level filter.
/// Call this once at application startup; later calls are ignored.
pub fn init_logging(level: LogLevel) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(false)
        .try_init();
}

/// Initialize logging into `dir/file_name`, truncating any previous log.
///
/// The returned guard flushes the background writer on drop and must be
/// kept alive for the lifetime of the host process.
pub fn init_file_logging(
    dir: &Path,
    file_name: &str,
    level: LogLevel,
) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(dir)?;
    let log_path = dir.join(file_name);
    if log_path.exists() {
        std::fs::remove_file(&log_path)?;
    }

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("logger already installed: {}", e))?;

    Ok(guard)
}
