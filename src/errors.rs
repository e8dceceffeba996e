use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Timeout error: operation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Rate limit exceeded: {service}")]
    RateLimit { service: String },

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unauthorized principal: {principal}")]
    Unauthorized { principal: i64 },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    /// Whether a retry of the failed operation could plausibly succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            WatchError::Network(_) => true,
            WatchError::Http { status, .. } => matches!(status, 429 | 500..=599),
            WatchError::RateLimit { .. } => true,
            WatchError::Timeout { .. } => true,
            WatchError::Notify(_) => true,
            _ => false,
        }
    }

    /// Errors that should stop the process rather than the current operation.
    pub fn is_critical(&self) -> bool {
        matches!(self, WatchError::Config(_))
    }

    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            WatchError::RateLimit { .. } => Some(60),
            WatchError::Http { status: 429, .. } => Some(60),
            WatchError::Network(_) => Some(10),
            WatchError::Timeout { .. } => Some(5),
            _ => None,
        }
    }
}

pub type WatchResult<T> = Result<T, WatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(WatchError::Network("reset".to_string()).is_recoverable());
        assert!(WatchError::Timeout { seconds: 15 }.is_recoverable());
        assert!(
            (WatchError::Http {
                status: 502,
                message: "bad gateway".to_string(),
            })
            .is_recoverable()
        );
        assert!(
            !(WatchError::Http {
                status: 404,
                message: "not found".to_string(),
            })
            .is_recoverable()
        );
        assert!(!WatchError::Config("missing token".to_string()).is_recoverable());
        assert!(!(WatchError::Unauthorized { principal: 42 }).is_recoverable());
    }

    #[test]
    fn test_critical_classification() {
        assert!(WatchError::Config("bad file".to_string()).is_critical());
        assert!(!WatchError::Network("reset".to_string()).is_critical());
    }

    #[test]
    fn test_retry_hints() {
        assert_eq!(
            WatchError::RateLimit {
                service: "geckoterminal".to_string()
            }
            .retry_after_seconds(),
            Some(60)
        );
        assert_eq!(
            WatchError::Config("x".to_string()).retry_after_seconds(),
            None
        );
    }
}
