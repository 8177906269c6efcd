//! # Configuration Modules
//!
//! Construction-time settings for the feed controller.

/// Feed tunables with defaults, file layering and validation.
pub mod config_feed;

pub use config_feed::{FeedConfig, FeedConfigOverlay, DEFAULT_SOURCE_URL};
