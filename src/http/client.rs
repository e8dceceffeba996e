/// Shared HTTP client construction and request pacing
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

use crate::config::Config;
use crate::errors::{WatchError, WatchResult};

/// Build a reqwest client with the given timeout and optional SOCKS5 proxy.
///
/// Every outbound request (API fetches and Telegram traffic) goes through a
/// client built here, so proxy routing is decided in exactly one place.
pub fn build_client(timeout_secs: u64, proxy_url: Option<&str>) -> WatchResult<Client> {
    let mut builder = Client::builder().timeout(Duration::from_secs(timeout_secs));

    if let Some(url) = proxy_url {
        let proxy = reqwest::Proxy::all(url)
            .map_err(|e| WatchError::Config(format!("Invalid proxy URL: {}", e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| WatchError::Network(format!("Failed to create HTTP client: {}", e)))
}

/// Build the shared client from the loaded configuration.
pub fn build_client_from_config(config: &Config) -> WatchResult<Client> {
    let proxy_url = config.proxy.url();
    build_client(config.api.request_timeout_seconds, proxy_url.as_deref())
}

/// Map a reqwest transport failure into the crate taxonomy.
///
/// Timeouts are distinguished so the retry policy and log lines can say so;
/// everything else (DNS, connect, proxy, TLS) is a plain network error.
pub fn classify_send_error(err: reqwest::Error, timeout_secs: u64) -> WatchError {
    if err.is_timeout() {
        WatchError::Timeout {
            seconds: timeout_secs,
        }
    } else {
        WatchError::Network(format!("Request failed: {}", err))
    }
}

/// Rate limiter for API clients
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    last_request: Arc<Mutex<Option<Instant>>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(max_per_minute: u32) -> Self {
        let min_interval = if max_per_minute > 0 {
            Duration::from_secs_f64(60.0 / max_per_minute as f64)
        } else {
            Duration::ZERO
        };

        Self {
            semaphore: Arc::new(Semaphore::new(1)), // Only 1 concurrent request
            last_request: Arc::new(Mutex::new(None)),
            min_interval,
        }
    }

    /// Wait until we can make a request (respects rate limits)
    pub async fn acquire(&self) -> WatchResult<RateLimitGuard> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| WatchError::Network(format!("Rate limiter closed: {}", e)))?;

        if !self.min_interval.is_zero() {
            let mut last = self.last_request.lock().await;
            let now = Instant::now();

            if let Some(last_time) = *last {
                let elapsed = last_time.elapsed();
                if elapsed < self.min_interval {
                    let sleep_duration = self.min_interval - elapsed;
                    drop(last);
                    tokio::time::sleep(sleep_duration).await;
                    let mut relocked = self.last_request.lock().await;
                    *relocked = Some(Instant::now());
                } else {
                    *last = Some(now);
                }
            } else {
                *last = Some(now);
            }
        }

        Ok(RateLimitGuard { _permit: permit })
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

/// RAII guard returned by [`RateLimiter::acquire`]
pub struct RateLimitGuard {
    _permit: OwnedSemaphorePermit,
}
