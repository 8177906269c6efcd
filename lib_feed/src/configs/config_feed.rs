//! # Feed Configuration
//!
//! Tunables accepted by the scheduler at construction. Values are layered the
//! same way the server configs are: built-in defaults first, then an optional
//! JSON file whose `Some` values override them.
//!
//! Every value is checked by [`FeedConfig::validate`] before a scheduler is
//! built; a bad value is a programming error, not something to recover from
//! at runtime.

use crate::errors::FeedError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Endpoint of the public unconfirmed-transactions feed.
pub const DEFAULT_SOURCE_URL: &str = "https://blockchain.info/unconfirmed-transactions?format=json";

/// # Feed Config
///
/// Fully resolved controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedConfig {
    /// Main cadence of the acquisition loop.
    pub poll_interval_ms: u64,
    /// Minimum spacing between two real calls to the live source.
    pub min_call_interval_ms: u64,
    /// Upper bound for a single live request.
    pub fetch_timeout_ms: u64,
    /// Inclusive `[min, max]` aggregate value a live candidate must fall in.
    pub value_range: (f64, f64),
    /// Values strictly above this are eligible for flagging.
    pub high_value_threshold: f64,
    /// Chance an eligible live event is flagged.
    pub flag_probability: f64,
    /// How long a flagged event holds the screen.
    pub extended_dwell_ms: u64,
    /// GET endpoint of the live source.
    pub source_url: String,
    /// User agent sent to the live source.
    pub user_agent: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 6_000,
            min_call_interval_ms: 5_000,
            fetch_timeout_ms: 3_000,
            value_range: (0.1, 500.0),
            high_value_threshold: 10.0,
            flag_probability: 0.25,
            extended_dwell_ms: 8_000,
            source_url: DEFAULT_SOURCE_URL.to_string(),
            user_agent: "LiveFeed/1.0".to_string(),
        }
    }
}

/// Partial configuration as read from a file. Missing keys keep the base value.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedConfigOverlay {
    pub poll_interval_ms: Option<u64>,
    pub min_call_interval_ms: Option<u64>,
    pub fetch_timeout_ms: Option<u64>,
    pub value_range: Option<(f64, f64)>,
    pub high_value_threshold: Option<f64>,
    pub flag_probability: Option<f64>,
    pub extended_dwell_ms: Option<u64>,
    pub source_url: Option<String>,
    pub user_agent: Option<String>,
}

impl FeedConfig {
    /// Merge an overlay, where `other` overrides `self` for `Some` values.
    pub fn merge(self, other: FeedConfigOverlay) -> FeedConfig {
        FeedConfig {
            poll_interval_ms: other.poll_interval_ms.unwrap_or(self.poll_interval_ms),
            min_call_interval_ms: other.min_call_interval_ms.unwrap_or(self.min_call_interval_ms),
            fetch_timeout_ms: other.fetch_timeout_ms.unwrap_or(self.fetch_timeout_ms),
            value_range: other.value_range.unwrap_or(self.value_range),
            high_value_threshold: other.high_value_threshold.unwrap_or(self.high_value_threshold),
            flag_probability: other.flag_probability.unwrap_or(self.flag_probability),
            extended_dwell_ms: other.extended_dwell_ms.unwrap_or(self.extended_dwell_ms),
            source_url: other.source_url.unwrap_or(self.source_url),
            user_agent: other.user_agent.unwrap_or(self.user_agent),
        }
    }

    /// Parses a JSON overlay and layers it over the defaults.
    pub fn from_json_str(json: &str) -> Result<FeedConfig, FeedError> {
        let overlay: FeedConfigOverlay = serde_json::from_str(json)?;
        let config = FeedConfig::default().merge(overlay);
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration.
    ///
    /// With no path, or a path that does not exist, the defaults are used.
    /// A file that exists but cannot be parsed is an error.
    pub fn load(path: Option<&Path>) -> Result<FeedConfig, FeedError> {
        let Some(path) = path else {
            return Ok(FeedConfig::default());
        };

        if !path.exists() {
            log::info!("Feed config not found at {}. Using defaults.", path.display());
            return Ok(FeedConfig::default());
        }

        let raw = fs::read_to_string(path)?;
        let config = Self::from_json_str(&raw)?;
        log::info!("Loaded feed config from {}", path.display());
        Ok(config)
    }

    /// Rejects values the controller cannot run with.
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.poll_interval_ms == 0 {
            return Err(FeedError::InvalidConfig("pollIntervalMs must be greater than zero".into()));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(FeedError::InvalidConfig("fetchTimeoutMs must be greater than zero".into()));
        }
        if self.extended_dwell_ms == 0 {
            return Err(FeedError::InvalidConfig("extendedDwellMs must be greater than zero".into()));
        }

        let (min, max) = self.value_range;
        if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max {
            return Err(FeedError::InvalidConfig(format!(
                "valueRange [{}, {}] must be finite, non-negative and ordered",
                min, max
            )));
        }
        if !self.high_value_threshold.is_finite() || self.high_value_threshold < 0.0 {
            return Err(FeedError::InvalidConfig(format!(
                "highValueThreshold {} must be a non-negative number",
                self.high_value_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.flag_probability) {
            return Err(FeedError::InvalidConfig(format!(
                "flagProbability {} must lie in [0, 1]",
                self.flag_probability
            )));
        }
        if self.source_url.trim().is_empty() {
            return Err(FeedError::InvalidConfig("sourceUrl must not be empty".into()));
        }
        Ok(())
    }

    /// Main cadence.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Rate-limit window.
    pub fn min_call_interval(&self) -> Duration {
        Duration::from_millis(self.min_call_interval_ms)
    }

    /// Request timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Flagged-event dwell.
    pub fn extended_dwell(&self) -> Duration {
        Duration::from_millis(self.extended_dwell_ms)
    }
}
