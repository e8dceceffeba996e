/// Retry policy shared by API fetches and outbound notifications
use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::errors::{WatchError, WatchResult};
use crate::logger::{self, LogTag};

/// Default attempt budget for outbound requests.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// First-retry delay; doubles on every further attempt.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;

/// HTTP statuses worth retrying. Anything else fails the call immediately.
pub const RETRYABLE_STATUSES: [u16; 2] = [429, 502];

/// How many attempts an operation gets and how long to wait between them.
///
/// One policy drives both fetch and notify paths so backoff behavior stays
/// uniform across the crate.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            retryable_statuses: RETRYABLE_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            retryable_statuses: RETRYABLE_STATUSES.to_vec(),
        }
    }

    /// Policy from the `[api]` config section.
    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(
            config.retry_attempts,
            Duration::from_millis(config.retry_base_delay_ms),
        )
    }

    /// Whether the error is worth another attempt under this policy.
    pub fn is_retryable(&self, error: &WatchError) -> bool {
        match error {
            WatchError::Http { status, .. } => self.retryable_statuses.contains(status),
            WatchError::Network(_) => true,
            WatchError::Timeout { .. } => true,
            WatchError::RateLimit { .. } => true,
            _ => false,
        }
    }

    /// Delay before the retry following `attempt` (0-based): the base delay
    /// doubled per attempt, plus jitter up to a quarter of the base.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let doubled = self.base_delay.saturating_mul(1u32 << attempt.min(16));
        let jitter_cap = (self.base_delay.as_millis() as u64 / 4).max(1);
        let jitter = rand::thread_rng().gen_range(0..=jitter_cap);
        doubled + Duration::from_millis(jitter)
    }

    /// Run `operation` until it succeeds, fails terminally, or the attempt
    /// budget runs out. On exhaustion the last error is returned.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> WatchResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = WatchResult<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error: Option<WatchError> = None;

        for attempt in 0..attempts {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if !self.is_retryable(&err) => {
                    logger::warning(
                        LogTag::Api,
                        &format!("{}: terminal error, not retrying: {}", label, err),
                    );
                    return Err(err);
                }
                Err(err) => {
                    let remaining = attempts - attempt - 1;
                    if remaining > 0 {
                        let delay = self.backoff_delay(attempt);
                        logger::warning(
                            LogTag::Api,
                            &format!(
                                "{}: attempt {}/{} failed ({}), retrying in {:.1}s",
                                label,
                                attempt + 1,
                                attempts,
                                err,
                                delay.as_secs_f64()
                            ),
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        logger::warning(
                            LogTag::Api,
                            &format!(
                                "{}: attempt {}/{} failed ({}), giving up",
                                label,
                                attempt + 1,
                                attempts,
                                err
                            ),
                        );
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| WatchError::Network(format!("{}: no attempts executed", label))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(1000));
        assert!(policy.retryable_statuses.contains(&429));
        assert!(policy.retryable_statuses.contains(&502));
        assert!(!policy.retryable_statuses.contains(&404));
    }

    #[test]
    fn test_retryable_classification() {
        let policy = RetryPolicy::default();
        assert!(policy.is_retryable(&WatchError::Network("down".to_string())));
        assert!(policy.is_retryable(&WatchError::Timeout { seconds: 15 }));
        assert!(policy.is_retryable(&WatchError::Http {
            status: 429,
            message: String::new(),
        }));
        assert!(policy.is_retryable(&WatchError::Http {
            status: 502,
            message: String::new(),
        }));
        assert!(!policy.is_retryable(&WatchError::Http {
            status: 404,
            message: String::new(),
        }));
        assert!(!policy.is_retryable(&WatchError::Parse("bad json".to_string())));
    }

    #[tokio::test]
    async fn test_success_needs_one_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = fast_policy()
            .run("test", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_after_exact_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: WatchResult<()> = fast_policy()
            .run("test", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(WatchError::Timeout { seconds: 1 })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_short_circuits() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: WatchResult<()> = fast_policy()
            .run("test", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(WatchError::Http {
                        status: 404,
                        message: "not found".to_string(),
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_retryable_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = fast_policy()
            .run("test", move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(WatchError::Http {
                            status: 502,
                            message: "bad gateway".to_string(),
                        })
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
