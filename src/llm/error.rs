//! Model host failures and the retry policy applied to them.

use std::time::Duration;

use thiserror::Error;

use crate::config::LlmConfig;

/// Longest pause between two attempts. Callers are waiting on an HTTP
/// response, so backoff stays short.
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// A failed call to the model host.
#[derive(Debug, Clone, Error)]
#[error("{kind}{}: {message}", status_suffix(.status_code))]
pub struct LlmError {
    pub kind: LlmErrorKind,
    /// HTTP status, when the host answered at all
    pub status_code: Option<u16>,
    pub message: String,
    /// Wait requested by the host (`Retry-After`)
    pub retry_after: Option<Duration>,
}

fn status_suffix(status_code: &Option<u16>) -> String {
    status_code
        .map(|code| format!(" (HTTP {})", code))
        .unwrap_or_default()
}

impl LlmError {
    fn new(kind: LlmErrorKind, status_code: Option<u16>, message: String) -> Self {
        Self {
            kind,
            status_code,
            message,
            retry_after: None,
        }
    }

    /// Classify a non-success HTTP answer.
    pub fn from_status(status: u16, message: String, retry_after: Option<Duration>) -> Self {
        match status {
            429 => Self::rate_limited(message, retry_after),
            400..=499 => Self::client_error(status, message),
            _ => Self::server_error(status, message),
        }
    }

    pub fn rate_limited(message: String, retry_after: Option<Duration>) -> Self {
        Self {
            retry_after,
            ..Self::new(LlmErrorKind::RateLimited, Some(429), message)
        }
    }

    pub fn server_error(status_code: u16, message: String) -> Self {
        Self::new(LlmErrorKind::ServerError, Some(status_code), message)
    }

    /// Bad request, auth, unknown model.
    pub fn client_error(status_code: u16, message: String) -> Self {
        Self::new(LlmErrorKind::ClientError, Some(status_code), message)
    }

    pub fn network_error(message: String) -> Self {
        Self::new(LlmErrorKind::NetworkError, None, message)
    }

    /// The per-call deadline elapsed.
    pub fn timeout(elapsed: Duration) -> Self {
        Self::new(
            LlmErrorKind::Timeout,
            None,
            format!("no response within {:?}", elapsed),
        )
    }

    /// The host's response envelope was malformed.
    pub fn parse_error(message: String) -> Self {
        Self::new(LlmErrorKind::ParseError, None, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    RateLimited,
    ServerError,
    ClientError,
    NetworkError,
    Timeout,
    ParseError,
}

impl LlmErrorKind {
    /// Whether the same request could succeed if sent again.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            LlmErrorKind::RateLimited
                | LlmErrorKind::ServerError
                | LlmErrorKind::NetworkError
                | LlmErrorKind::Timeout
        )
    }

    /// First backoff step before doubling.
    fn base_delay(self) -> Duration {
        match self {
            LlmErrorKind::RateLimited => Duration::from_secs(2),
            _ => Duration::from_millis(500),
        }
    }
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LlmErrorKind::RateLimited => "Rate limited",
            LlmErrorKind::ServerError => "Server error",
            LlmErrorKind::ClientError => "Client error",
            LlmErrorKind::NetworkError => "Network error",
            LlmErrorKind::Timeout => "Timeout",
            LlmErrorKind::ParseError => "Parse error",
        };
        f.write_str(name)
    }
}

/// How often, and for how long, one model call may be retried.
///
/// Only transient transport failures qualify. Schema problems never reach
/// this layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Total time one call may spend across its attempts and pauses
    pub budget: Duration,
}

impl RetryConfig {
    /// Every failure goes straight back to the caller.
    pub fn disabled() -> Self {
        Self::with_max_retries(0)
    }

    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            budget: Duration::from_secs(60),
        }
    }

    /// Whether `error`, seen after `attempt` retries, earns another try.
    pub fn should_retry(&self, error: &LlmError, attempt: u32) -> bool {
        attempt < self.max_retries && error.kind.is_transient()
    }

    /// Pause before retry number `attempt + 1`.
    ///
    /// A host-supplied `Retry-After` wins (zero means retry at once);
    /// otherwise the kind's base delay doubles per attempt, capped.
    pub fn backoff(&self, error: &LlmError, attempt: u32) -> Duration {
        if let Some(wait) = error.retry_after {
            return wait.min(MAX_BACKOFF);
        }
        error
            .kind
            .base_delay()
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(MAX_BACKOFF)
    }
}

impl From<&LlmConfig> for RetryConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            budget: config.retry_budget,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let err = LlmError::from_status(429, "slow down".to_string(), Some(Duration::from_secs(3)));
        assert_eq!(err.kind, LlmErrorKind::RateLimited);
        assert_eq!(err.retry_after, Some(Duration::from_secs(3)));

        assert_eq!(
            LlmError::from_status(401, String::new(), None).kind,
            LlmErrorKind::ClientError
        );
        assert_eq!(
            LlmError::from_status(503, String::new(), None).kind,
            LlmErrorKind::ServerError
        );
    }

    #[test]
    fn test_only_transient_kinds_are_retried() {
        let retry = RetryConfig::with_max_retries(2);
        assert!(retry.should_retry(&LlmError::timeout(Duration::from_secs(1)), 0));
        assert!(retry.should_retry(&LlmError::network_error("reset".to_string()), 1));
        assert!(!retry.should_retry(&LlmError::network_error("reset".to_string()), 2));
        assert!(!retry.should_retry(&LlmError::client_error(401, "bad key".to_string()), 0));
        assert!(!retry.should_retry(&LlmError::parse_error("<html>".to_string()), 0));
        assert!(!RetryConfig::disabled().should_retry(&LlmError::timeout(Duration::ZERO), 0));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let retry = RetryConfig::with_max_retries(5);
        let err = LlmError::server_error(502, "bad gateway".to_string());
        assert_eq!(retry.backoff(&err, 0), Duration::from_millis(500));
        assert_eq!(retry.backoff(&err, 1), Duration::from_secs(1));
        assert_eq!(retry.backoff(&err, 2), Duration::from_secs(2));
        assert_eq!(retry.backoff(&err, 10), MAX_BACKOFF);
    }

    #[test]
    fn test_retry_after_wins() {
        let retry = RetryConfig::with_max_retries(1);
        let err = LlmError::rate_limited("x".to_string(), Some(Duration::ZERO));
        assert_eq!(retry.backoff(&err, 3), Duration::ZERO);

        let err = LlmError::rate_limited("x".to_string(), Some(Duration::from_secs(600)));
        assert_eq!(retry.backoff(&err, 0), MAX_BACKOFF);
    }

    #[test]
    fn test_display_includes_status() {
        let error = LlmError::client_error(401, "invalid api key".to_string());
        assert_eq!(error.to_string(), "Client error (HTTP 401): invalid api key");

        let error = LlmError::timeout(Duration::from_secs(30));
        assert_eq!(error.to_string(), "Timeout: no response within 30s");
    }
}
