// Bot lifecycle built on the ServiceManager

use crate::{
    logger::{self, LogTag},
    services::{ServiceManager, WatcherService},
    telegram::TelegramService,
};

/// Main bot execution function, handles the full lifecycle:
/// config, storage, services, shutdown.
pub async fn run_bot() -> Result<(), String> {
    // 1. Load configuration (a parse failure is fatal, a missing file is
    //    created with defaults)
    let config_path = crate::config::config_file_path();
    crate::config::load_config().map_err(|e| format!("Failed to load config: {}", e))?;
    logger::info(
        LogTag::System,
        &format!("Configuration loaded from {}", config_path),
    );

    // 2. Open the snapshot database
    let db_path = crate::config::with_config(|cfg| cfg.database.path.clone());
    crate::database::init_database(&db_path)
        .map_err(|e| format!("Failed to open database: {}", e))?;
    logger::info(LogTag::System, &format!("Snapshot storage at {}", db_path));

    // 3. Register services. Telegram carries a lower priority so the
    //    notifier is live before the watcher runs its first cycle.
    let mut service_manager = ServiceManager::new();
    service_manager.register(Box::new(TelegramService));
    service_manager.register(Box::new(WatcherService));

    // 4. Start all services
    service_manager.start_all().await?;

    logger::info(LogTag::System, "All services started - WatchBot is running");

    // 5. Wait for shutdown signal
    wait_for_shutdown_signal().await?;

    // 6. Stop all services gracefully
    logger::info(LogTag::System, "Initiating graceful shutdown...");

    service_manager.stop_all().await?;

    logger::info(LogTag::System, "WatchBot shut down successfully");

    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C, SIGTERM, SIGHUP, SIGQUIT on Unix)
async fn wait_for_shutdown_signal() -> Result<(), String> {
    logger::info(
        LogTag::System,
        "Waiting for shutdown signal (press Ctrl+C twice to force kill)",
    );

    #[cfg(unix)]
    let signal_name = {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint =
            signal(SignalKind::interrupt()).map_err(|e| format!("Failed to bind SIGINT: {}", e))?;
        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| format!("Failed to bind SIGTERM: {}", e))?;
        let mut sighup =
            signal(SignalKind::hangup()).map_err(|e| format!("Failed to bind SIGHUP: {}", e))?;
        let mut sigquit =
            signal(SignalKind::quit()).map_err(|e| format!("Failed to bind SIGQUIT: {}", e))?;

        tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
            _ = sighup.recv() => "SIGHUP",
            _ = sigquit.recv() => "SIGQUIT",
        }
    };

    #[cfg(windows)]
    let signal_name = {
        // On Windows ctrl_c() covers Ctrl+C and Ctrl+Break
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| format!("Failed to listen for shutdown signal: {}", e))?;
        "CTRL_C"
    };

    logger::warning(
        LogTag::System,
        &format!(
            "Shutdown signal received ({}). Press Ctrl+C again to force kill.",
            signal_name
        ),
    );

    // A second Ctrl+C during graceful shutdown exits immediately
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            logger::error(LogTag::System, "Second Ctrl+C detected, forcing exit.");
            // 130 is the conventional exit code for SIGINT
            std::process::exit(130);
        }
    });

    Ok(())
}
