//! Plain-text log file output.
//!
//! Mirrors every console line (without colors) into `data/logs/watchbot.log`,
//! rotating the file once when it grows past the size cap. The current file
//! is what the Telegram `logfile` command ships.

use once_cell::sync::Lazy;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

const LOG_DIR: &str = "data/logs";
const LOG_FILE: &str = "watchbot.log";
const MAX_LOG_SIZE_BYTES: u64 = 5 * 1024 * 1024;

static LOG_HANDLE: Lazy<Mutex<Option<File>>> = Lazy::new(|| Mutex::new(None));

/// Path of the active log file.
pub fn get_log_file_path() -> PathBuf {
    PathBuf::from(LOG_DIR).join(LOG_FILE)
}

/// Create the log directory and open the log file for appending.
pub fn init_file_logging() {
    if let Err(e) = fs::create_dir_all(LOG_DIR) {
        eprintln!("Failed to create log directory {}: {}", LOG_DIR, e);
        return;
    }

    match open_log_file() {
        Ok(file) => {
            if let Ok(mut guard) = LOG_HANDLE.lock() {
                *guard = Some(file);
            }
        }
        Err(e) => eprintln!("Failed to open log file: {}", e),
    }
}

/// Append one line to the log file. Silently drops the line when file
/// logging is unavailable so logging can never take the process down.
pub fn write_to_file(line: &str) {
    let mut guard = match LOG_HANDLE.lock() {
        Ok(guard) => guard,
        Err(_) => return,
    };

    if guard.is_none() {
        return;
    }

    if let Some(file) = guard.as_mut() {
        if writeln!(file, "{}", line).is_err() {
            *guard = None;
            return;
        }
    }

    // Rotate once the file passes the cap; the previous generation is kept
    // as watchbot.log.1.
    if log_file_size() > MAX_LOG_SIZE_BYTES {
        *guard = None;
        let path = get_log_file_path();
        let rotated = PathBuf::from(LOG_DIR).join(format!("{}.1", LOG_FILE));
        let _ = fs::rename(&path, &rotated);
        if let Ok(file) = open_log_file() {
            *guard = Some(file);
        }
    }
}

/// Flush pending writes, used during shutdown.
pub fn flush_file_logging() {
    if let Ok(mut guard) = LOG_HANDLE.lock() {
        if let Some(file) = guard.as_mut() {
            let _ = file.flush();
        }
    }
}

fn open_log_file() -> std::io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(get_log_file_path())
}

fn log_file_size() -> u64 {
    fs::metadata(get_log_file_path())
        .map(|m| m.len())
        .unwrap_or(0)
}
