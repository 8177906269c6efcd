//! # Feed Errors
//!
//! Two families of errors exist in the controller:
//!
//! - [`FeedError`] covers misconfiguration and lifecycle misuse. These are
//!   returned from constructors and `start()` and are meant to be fatal to the
//!   caller.
//! - [`FetchFailure`] covers everything that can go wrong talking to the live
//!   source. It never escapes the fetcher as an error; the scheduler turns it
//!   into a fallback event plus a human-readable reason.

use thiserror::Error;

/// Construction and lifecycle errors.
#[derive(Debug, Error)]
pub enum FeedError {
    /// A configuration value is out of its allowed domain.
    #[error("Invalid feed configuration: {0}")]
    InvalidConfig(String),

    /// The synthetic pool was built with no entries.
    #[error("Synthetic event pool must contain at least one entry")]
    EmptyPool,

    /// The configuration file could not be parsed.
    #[error("Failed to parse feed configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP client for the live source could not be built.
    #[cfg(feature = "retrieve")]
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// `start()` was called on a scheduler that is already running.
    #[error("Feed scheduler is already running")]
    AlreadyRunning,

    /// The feed task panicked and its state could not be recovered.
    #[error("Feed worker was lost: {0}")]
    WorkerLost(String),
}

/// Why a live fetch produced no event.
///
/// The `Display` output doubles as the reason string shown on the dashboard
/// while the feed runs in fallback mode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    /// The request exceeded the configured timeout.
    #[error("live source timed out after {0} ms")]
    Timeout(u64),

    /// The source answered with a non-2xx status.
    #[error("live source returned HTTP {0}")]
    HttpStatus(u16),

    /// Connection-level failure (DNS, TLS, reset...).
    #[error("live source unreachable: {0}")]
    Transport(String),

    /// The body was not the expected JSON shape.
    #[error("live source sent a malformed payload: {0}")]
    Malformed(String),

    /// The payload parsed but no transaction fell inside the value range.
    #[error("no live transactions in the display range")]
    NoCandidates,

    /// The request was aborted because the feed is shutting down.
    #[error("live fetch cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_failure_reasons_are_readable() {
        assert_eq!(
            FetchFailure::Timeout(3000).to_string(),
            "live source timed out after 3000 ms"
        );
        assert_eq!(FetchFailure::HttpStatus(503).to_string(), "live source returned HTTP 503");
        assert_eq!(
            FetchFailure::NoCandidates.to_string(),
            "no live transactions in the display range"
        );
    }

    #[test]
    fn test_config_parse_error_converts() {
        let err: FeedError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert!(matches!(err, FeedError::ConfigParse(_)));
        assert!(err.to_string().starts_with("Failed to parse feed configuration"));
    }
}
