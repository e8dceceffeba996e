//! Filtering rules deciding which log calls reach the output.

use super::config::get_logger_config;
use super::format;
use super::levels::LogLevel;
use super::tags::LogTag;

/// Apply filtering and hand the message to the formatter.
pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(&tag, level) {
        return;
    }
    format::format_and_log(tag, level.as_str(), message);
}

/// Filtering rules:
/// - Error is always shown.
/// - Warning and Info are shown unless --quiet.
/// - Debug requires --debug-<module> (or --debug-all) for the tag.
/// - Verbose requires --verbose.
fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    let config = get_logger_config();

    match level {
        LogLevel::Error => true,
        LogLevel::Warning | LogLevel::Info => !config.quiet,
        LogLevel::Debug => config.debug_enabled_for(tag),
        LogLevel::Verbose => config.verbose,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::config::{set_logger_config, LoggerConfig};

    #[test]
    fn test_should_log_rules() {
        set_logger_config(LoggerConfig {
            debug_collector: true,
            ..Default::default()
        });

        assert!(should_log(&LogTag::System, LogLevel::Error));
        assert!(should_log(&LogTag::System, LogLevel::Info));
        assert!(should_log(&LogTag::Collector, LogLevel::Debug));
        assert!(!should_log(&LogTag::Api, LogLevel::Debug));
        assert!(!should_log(&LogTag::System, LogLevel::Verbose));

        set_logger_config(LoggerConfig {
            quiet: true,
            ..Default::default()
        });
        assert!(should_log(&LogTag::System, LogLevel::Error));
        assert!(!should_log(&LogTag::System, LogLevel::Warning));
        assert!(!should_log(&LogTag::System, LogLevel::Info));

        set_logger_config(LoggerConfig::default());
    }
}
