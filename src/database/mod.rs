//! SQLite persistence for token and gas snapshots.
//!
//! The database is append-only: every collection cycle inserts new rows and
//! readers ask for the latest row per key. A single connection behind a mutex
//! serializes all writes.

pub mod snapshots;

pub use snapshots::{GasPriceSnapshot, TokenSnapshot};

use once_cell::sync::OnceCell;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::errors::{WatchError, WatchResult};
use crate::logger::{self, LogTag};

static DATABASE: OnceCell<Arc<Database>> = OnceCell::new();

/// Shared SQLite handle.
pub struct Database {
    pub(crate) conn: Mutex<Connection>,
}

impl Database {
    /// Open (creating if needed) the database at `path` and ensure the schema.
    pub fn open(path: &str) -> WatchResult<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_millis(5_000))?;

        init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn init_schema(conn: &Connection) -> WatchResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS token_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            chain TEXT NOT NULL,
            address TEXT NOT NULL,
            label TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            price_usd REAL NOT NULL,
            market_cap_usd REAL NOT NULL,
            volume_24h_usd REAL NOT NULL,
            cost_basis REAL NOT NULL,
            quantity REAL NOT NULL,
            current_worth REAL NOT NULL,
            pnl_percent REAL NOT NULL,
            pnl_delta REAL NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_token_snapshots_key_time
            ON token_snapshots (chain, address, timestamp);
        CREATE TABLE IF NOT EXISTS gas_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            chain TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            price_gwei REAL NOT NULL,
            price_usd REAL NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_gas_snapshots_time
            ON gas_snapshots (timestamp);",
    )?;

    Ok(())
}

/// Open the global database once at startup.
pub fn init_database(path: &str) -> WatchResult<()> {
    let database = Arc::new(Database::open(path)?);

    DATABASE
        .set(database)
        .map_err(|_| WatchError::Config("Database already initialized".to_string()))?;

    logger::info(
        LogTag::Storage,
        &format!("Database initialized at {}", path),
    );

    Ok(())
}

/// Shared handle to the global database.
pub fn get_database() -> WatchResult<Arc<Database>> {
    DATABASE
        .get()
        .cloned()
        .ok_or_else(|| WatchError::Config("Database not initialized".to_string()))
}
