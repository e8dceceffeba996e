//! Logger configuration derived from command-line flags.

use crate::arguments;
use crate::logger::tags::LogTag;
use once_cell::sync::Lazy;
use std::sync::RwLock;

/// Runtime logger settings, initialized once from the process arguments.
#[derive(Debug, Clone, Default)]
pub struct LoggerConfig {
    pub debug_scheduler: bool,
    pub debug_collector: bool,
    pub debug_api: bool,
    pub debug_telegram: bool,
    pub debug_storage: bool,
    pub debug_all: bool,
    pub verbose: bool,
    pub quiet: bool,
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

/// Populate the logger configuration from the command-line arguments.
pub fn init_from_args() {
    let config = LoggerConfig {
        debug_scheduler: arguments::is_debug_scheduler_enabled(),
        debug_collector: arguments::is_debug_collector_enabled(),
        debug_api: arguments::is_debug_api_enabled(),
        debug_telegram: arguments::is_debug_telegram_enabled(),
        debug_storage: arguments::is_debug_storage_enabled(),
        debug_all: arguments::is_debug_all_enabled(),
        verbose: arguments::is_verbose_enabled(),
        quiet: arguments::is_quiet_enabled(),
    };
    set_logger_config(config);
}

pub fn get_logger_config() -> LoggerConfig {
    match LOGGER_CONFIG.read() {
        Ok(config) => config.clone(),
        Err(_) => LoggerConfig::default(),
    }
}

pub fn set_logger_config(config: LoggerConfig) {
    if let Ok(mut guard) = LOGGER_CONFIG.write() {
        *guard = config;
    }
}

impl LoggerConfig {
    /// Whether debug output is enabled for the given tag.
    pub fn debug_enabled_for(&self, tag: &LogTag) -> bool {
        if self.debug_all {
            return true;
        }
        match tag {
            LogTag::Scheduler => self.debug_scheduler,
            LogTag::Collector => self.debug_collector,
            LogTag::Api | LogTag::Gas => self.debug_api,
            LogTag::Telegram => self.debug_telegram,
            LogTag::Storage => self.debug_storage,
            _ => false,
        }
    }
}
