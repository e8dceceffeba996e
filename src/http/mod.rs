//! Outbound HTTP plumbing shared by the API clients and the Telegram
//! notifier: client construction (timeout + optional SOCKS5 proxy),
//! request pacing, and the crate-wide retry policy.

pub mod client;
pub mod retry;

pub use client::{build_client, build_client_from_config, classify_send_error};
pub use client::{RateLimitGuard, RateLimiter};
pub use retry::RetryPolicy;
