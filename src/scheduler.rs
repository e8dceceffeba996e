//! Cycle scheduler: interval loop, single-slot execution and the restart
//! trigger used by the /restart command.
//!
//! The first cycle runs immediately at startup, then one per
//! `scan_interval_seconds`. A trigger that arrives while a cycle is in
//! flight is dropped and counted, never queued, so cycles cannot pile up
//! behind a slow network.

use crate::collector::{Collector, CycleOutcome};
use crate::config;
use crate::database;
use crate::logger::{self, LogTag};
use crate::telegram::notifier;
use chrono::Utc;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Snapshot of scheduler state for /status and health checks.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStatus {
    pub running: bool,
    pub busy: bool,
    pub last_cycle_unix: Option<i64>,
    pub next_cycle_unix: Option<i64>,
    pub missed_ticks: u64,
    pub last_outcome: Option<CycleOutcome>,
}

#[derive(Debug, Default)]
struct SchedulerState {
    last_cycle_unix: Option<i64>,
    next_cycle_unix: Option<i64>,
    last_outcome: Option<CycleOutcome>,
}

pub struct Scheduler {
    running: AtomicBool,
    busy: AtomicBool,
    missed_ticks: AtomicU64,
    restart: Notify,
    state: Mutex<SchedulerState>,
}

impl Scheduler {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            busy: AtomicBool::new(false),
            missed_ticks: AtomicU64::new(0),
            restart: Notify::new(),
            state: Mutex::new(SchedulerState::default()),
        }
    }

    /// Main loop. Runs until `shutdown` fires; an in-flight cycle always
    /// finishes before the loop exits.
    pub async fn run(&self, shutdown: Arc<Notify>) {
        self.running.store(true, Ordering::SeqCst);
        logger::info(LogTag::Scheduler, "Scheduler started, running first cycle");

        // Original behavior: collect once right away instead of waiting a
        // full interval after startup.
        self.execute_cycle().await;

        loop {
            let interval_secs =
                config::with_config(|c| c.watcher.scan_interval_seconds).max(1);
            self.set_next_cycle(Some(Utc::now().timestamp() + interval_secs as i64));

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(interval_secs)) => {
                    self.execute_cycle().await;
                }
                _ = self.restart.notified() => {
                    logger::info(LogTag::Scheduler, "Restart requested, running a cycle now");
                    self.execute_cycle().await;
                }
                _ = shutdown.notified() => break,
            }
        }

        self.running.store(false, Ordering::SeqCst);
        self.set_next_cycle(None);
        logger::info(LogTag::Scheduler, "Scheduler stopped");
    }

    /// Request an immediate cycle. Returns false when the scheduler is not
    /// running or a cycle is already in flight (the request is dropped and
    /// counted as a missed tick).
    pub fn restart_now(&self) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        if self.busy.load(Ordering::SeqCst) {
            self.missed_ticks.fetch_add(1, Ordering::SeqCst);
            logger::warning(LogTag::Scheduler, "Restart request dropped, cycle in flight");
            return false;
        }
        self.restart.notify_one();
        true
    }

    pub fn status(&self) -> SchedulerStatus {
        let state = self.state.lock().unwrap();
        SchedulerStatus {
            running: self.running.load(Ordering::SeqCst),
            busy: self.busy.load(Ordering::SeqCst),
            last_cycle_unix: state.last_cycle_unix,
            next_cycle_unix: state.next_cycle_unix,
            missed_ticks: self.missed_ticks.load(Ordering::SeqCst),
            last_outcome: state.last_outcome.clone(),
        }
    }

    /// Claim the single cycle slot. A second claim while the slot is held
    /// fails and is counted as a missed tick.
    fn try_begin_cycle(&self) -> bool {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.missed_ticks.fetch_add(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    fn end_cycle(&self, outcome: CycleOutcome) {
        {
            let mut state = self.state.lock().unwrap();
            state.last_cycle_unix = Some(Utc::now().timestamp());
            state.last_outcome = Some(outcome);
        }
        self.busy.store(false, Ordering::SeqCst);
    }

    fn set_next_cycle(&self, timestamp: Option<i64>) {
        let mut state = self.state.lock().unwrap();
        state.next_cycle_unix = timestamp;
    }

    async fn execute_cycle(&self) {
        if !self.try_begin_cycle() {
            logger::warning(LogTag::Scheduler, "Cycle already in flight, tick dropped");
            return;
        }

        // Immutable snapshot for the whole cycle; a reload lands next tick.
        let config = config::get_config_clone();
        let outcome = self.build_and_run(config).await;
        self.end_cycle(outcome);
    }

    /// A cycle that cannot even be set up still ends cleanly: the error is
    /// logged, an empty outcome recorded, and the loop keeps ticking.
    async fn build_and_run(&self, config: config::Config) -> CycleOutcome {
        let db = match database::get_database() {
            Ok(db) => db,
            Err(e) => {
                logger::error(LogTag::Scheduler, &format!("Cycle skipped, no database: {}", e));
                return CycleOutcome::default();
            }
        };

        match Collector::new(config, db, notifier::get_notifier()) {
            Ok(collector) => collector.run_cycle().await,
            Err(e) => {
                logger::error(LogTag::Scheduler, &format!("Cycle setup failed: {}", e));
                CycleOutcome::default()
            }
        }
    }
}

// ============================================================================
// GLOBAL SCHEDULER
// ============================================================================

static SCHEDULER: Lazy<Arc<Scheduler>> = Lazy::new(|| Arc::new(Scheduler::new()));

pub fn get_scheduler() -> Arc<Scheduler> {
    SCHEDULER.clone()
}
