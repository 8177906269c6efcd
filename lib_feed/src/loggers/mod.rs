//! # Loggers
//!
//! fern-based output for the `log` records the controller emits.

/// Console + file logger installation and log file housekeeping.
pub mod setup;

pub use setup::{parse_level, setup_logging};
