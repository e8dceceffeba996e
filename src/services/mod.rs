//! Service lifecycle: a small trait for long-running subsystems and a
//! manager that starts them in priority order and stops them in reverse.

use crate::logger::{self, LogTag};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// How long stop_all waits for each task handle before giving up on it.
const STOP_JOIN_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceHealth {
    Healthy,
    /// Running, but with reduced function.
    Degraded(String),
    Unhealthy(String),
}

impl ServiceHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ServiceHealth::Healthy)
    }
}

/// A long-running subsystem owned by the `ServiceManager`.
///
/// `start` spawns the service's tasks and returns their handles; tasks are
/// expected to exit when the shared shutdown `Notify` fires.
#[async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lower priority starts earlier and stops later.
    fn priority(&self) -> i32 {
        100
    }

    async fn initialize(&mut self) -> Result<(), String> {
        Ok(())
    }

    async fn start(&mut self, shutdown: Arc<Notify>) -> Result<Vec<JoinHandle<()>>, String>;

    async fn stop(&mut self) -> Result<(), String> {
        Ok(())
    }

    async fn health(&self) -> ServiceHealth {
        ServiceHealth::Healthy
    }
}

pub struct ServiceManager {
    services: Vec<Box<dyn Service>>,
    handles: HashMap<&'static str, Vec<JoinHandle<()>>>,
    shutdown: Arc<Notify>,
}

impl ServiceManager {
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
            handles: HashMap::new(),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn register(&mut self, service: Box<dyn Service>) {
        self.services.push(service);
    }

    /// Initialize and start every registered service, lowest priority
    /// first. The first failure aborts startup.
    pub async fn start_all(&mut self) -> Result<(), String> {
        logger::info(LogTag::System, "Starting services");
        self.services.sort_by_key(|service| service.priority());

        for service in self.services.iter_mut() {
            let name = service.name();

            logger::info(LogTag::System, &format!("Initializing service: {}", name));
            service.initialize().await?;

            let handles = service.start(self.shutdown.clone()).await?;
            self.handles.insert(name, handles);
            logger::info(LogTag::System, &format!("Service started: {}", name));
        }

        logger::info(LogTag::System, "All services started");
        Ok(())
    }

    /// Signal shutdown and stop services in reverse start order, waiting a
    /// bounded time for each task to finish.
    pub async fn stop_all(&mut self) -> Result<(), String> {
        logger::info(LogTag::System, "Stopping services");
        self.shutdown.notify_waiters();

        for service in self.services.iter_mut().rev() {
            let name = service.name();

            if let Err(e) = service.stop().await {
                logger::warning(LogTag::System, &format!("Service {} stop error: {}", name, e));
            }

            if let Some(handles) = self.handles.remove(name) {
                for handle in handles {
                    let _ = tokio::time::timeout(
                        Duration::from_secs(STOP_JOIN_TIMEOUT_SECS),
                        handle,
                    )
                    .await;
                }
            }

            logger::info(LogTag::System, &format!("Service stopped: {}", name));
        }

        logger::info(LogTag::System, "All services stopped");
        Ok(())
    }

    pub async fn get_health(&self) -> HashMap<&'static str, ServiceHealth> {
        let mut health = HashMap::new();
        for service in &self.services {
            health.insert(service.name(), service.health().await);
        }
        health
    }
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// WATCHER SERVICE
// ============================================================================

/// Runs the scheduler loop. Started after the Telegram service so the
/// first cycle can already deliver alerts.
pub struct WatcherService;

#[async_trait]
impl Service for WatcherService {
    fn name(&self) -> &'static str {
        "watcher"
    }

    fn priority(&self) -> i32 {
        60
    }

    async fn start(&mut self, shutdown: Arc<Notify>) -> Result<Vec<JoinHandle<()>>, String> {
        let scheduler = crate::scheduler::get_scheduler();
        let handle = tokio::spawn(async move {
            scheduler.run(shutdown).await;
        });
        Ok(vec![handle])
    }

    async fn health(&self) -> ServiceHealth {
        let status = crate::scheduler::get_scheduler().status();
        if status.running {
            ServiceHealth::Healthy
        } else {
            ServiceHealth::Unhealthy("scheduler not running".to_string())
        }
    }
}
