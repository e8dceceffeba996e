//! Structured logging for WatchBot.
//!
//! Provides tagged, leveled logging with:
//! - Per-module debug control via `--debug-<module>` flags
//! - Standard levels (Error/Warning/Info/Debug/Verbose)
//! - Dual output: colored console + plain file at `data/logs/watchbot.log`
//!
//! ## Usage
//!
//! ```rust
//! use watchbot::logger::{self, LogTag};
//!
//! logger::error(LogTag::Api, "Request failed");
//! logger::info(LogTag::Scheduler, "Cycle finished");
//! logger::debug(LogTag::Collector, "Merged 3 chains"); // needs --debug-collector
//! ```
//!
//! Call `logger::init()` once at startup before any services run; it reads
//! the debug flags from the command line and opens the log file.

mod config;
mod core;
mod file;
mod format;
mod levels;
mod tags;

pub use config::{get_logger_config, init_from_args, set_logger_config, LoggerConfig};
pub use file::get_log_file_path;
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger system: flag parsing, then file output.
pub fn init() {
    config::init_from_args();
    file::init_file_logging();
}

/// Log at ERROR level. Always shown.
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level. Shown unless --quiet.
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level. Shown unless --quiet.
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level. Only shown with the matching --debug-<module> flag.
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level. Only shown with --verbose.
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// Flush pending file writes, called during shutdown.
pub fn flush() {
    file::flush_file_logging();
}
