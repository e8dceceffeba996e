use watchbot::{
    arguments::{is_help_requested, print_debug_info, print_help},
    logger::{self as logger, LogTag},
};

/// Main entry point for WatchBot
///
/// Parses the command line, brings the logger up and hands off to
/// `run::run_bot` for the full lifecycle. The process stays up until a
/// shutdown signal arrives.
#[tokio::main]
async fn main() {
    // Initialize logger system (reads debug flags, opens the log file)
    logger::init();

    // Check for help request first (before any other processing)
    if is_help_requested() {
        print_help();
        std::process::exit(0);
    }

    logger::info(
        LogTag::System,
        &format!("WatchBot v{} starting up...", env!("CARGO_PKG_VERSION")),
    );

    // Print debug information if any debug modes are enabled
    print_debug_info();

    match watchbot::run::run_bot().await {
        Ok(_) => {
            logger::info(LogTag::System, "WatchBot completed successfully");
        }
        Err(e) => {
            logger::error(LogTag::System, &format!("WatchBot failed: {}", e));
            logger::flush();
            std::process::exit(1);
        }
    }

    logger::flush();
}
