/// Centralized argument handling for WatchBot.
///
/// Stores the process arguments once at startup so every module checks the
/// same view, and exposes the debug-flag helpers used by the logger.
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

/// Global command-line arguments storage.
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Sets the global command-line arguments.
/// Used by tests to override the default env::args() collection.
pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

/// Gets a copy of the current command-line arguments.
pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        Err(_) => env::args().collect(),
    }
}

/// Checks if a specific argument is present in the command line.
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Gets the value of a command-line argument that follows a flag.
/// Returns None if the flag is not found or has no value.
pub fn get_arg_value(flag: &str) -> Option<String> {
    let args = get_cmd_args();
    for (i, arg) in args.iter().enumerate() {
        if arg == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

/// Path override for the config file (`--config <path>`).
pub fn get_config_path_override() -> Option<String> {
    get_arg_value("--config")
}

// =============================================================================
// DEBUG FLAG CHECKING FUNCTIONS
// =============================================================================

/// Scheduler loop debug mode
pub fn is_debug_scheduler_enabled() -> bool {
    has_arg("--debug-scheduler")
}

/// Collection cycle debug mode
pub fn is_debug_collector_enabled() -> bool {
    has_arg("--debug-collector")
}

/// API request/response debug mode
pub fn is_debug_api_enabled() -> bool {
    has_arg("--debug-api")
}

/// Telegram command and notification debug mode
pub fn is_debug_telegram_enabled() -> bool {
    has_arg("--debug-telegram")
}

/// Snapshot storage debug mode
pub fn is_debug_storage_enabled() -> bool {
    has_arg("--debug-storage")
}

/// Enable every module's debug output
pub fn is_debug_all_enabled() -> bool {
    has_arg("--debug-all")
}

/// Verbose trace output
pub fn is_verbose_enabled() -> bool {
    has_arg("--verbose")
}

/// Suppress warnings, keep errors
pub fn is_quiet_enabled() -> bool {
    has_arg("--quiet")
}

/// `--help` or `-h` anywhere on the command line.
pub fn is_help_requested() -> bool {
    has_arg("--help") || has_arg("-h")
}

/// Print usage and flags to stdout.
pub fn print_help() {
    println!("WatchBot v{}", env!("CARGO_PKG_VERSION"));
    println!("Token metric watcher with PnL alerts over Telegram.");
    println!();
    println!("USAGE:");
    println!("    watchbot [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --config <path>      Config file path (default: data/config.toml)");
    println!("    --quiet              Suppress warnings, keep errors");
    println!("    --verbose            Verbose trace output");
    println!("    --debug-all          Debug output for every module");
    println!("    --debug-scheduler    Scheduler loop debug output");
    println!("    --debug-collector    Collection cycle debug output");
    println!("    --debug-api          API request/response debug output");
    println!("    --debug-telegram     Telegram debug output");
    println!("    --debug-storage      Snapshot storage debug output");
    println!("    -h, --help           Print this help");
}

/// Log which debug flags are active, if any.
pub fn print_debug_info() {
    let mut enabled = Vec::new();
    if is_debug_all_enabled() {
        enabled.push("all");
    }
    if is_debug_scheduler_enabled() {
        enabled.push("scheduler");
    }
    if is_debug_collector_enabled() {
        enabled.push("collector");
    }
    if is_debug_api_enabled() {
        enabled.push("api");
    }
    if is_debug_telegram_enabled() {
        enabled.push("telegram");
    }
    if is_debug_storage_enabled() {
        enabled.push("storage");
    }

    if !enabled.is_empty() {
        crate::logger::info(
            crate::logger::LogTag::System,
            &format!("Debug output enabled for: {}", enabled.join(", ")),
        );
    }
}
