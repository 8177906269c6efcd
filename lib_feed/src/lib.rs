//! # lib_feed
//!
//! The live transaction feed controller behind the forensic dashboard's
//! "Live Feed" panel. It acquires transaction events from a rate-limited HTTP
//! source, falls back to a canned synthetic pool when the source is throttled
//! or failing, deduplicates and paces events for display, and holds flagged
//! events on screen for an extended dwell time.
//!
//! The rendering side (cards, themes, routing) is not part of this crate: it
//! only observes the [`FeedSnapshot`] published by the [`FeedScheduler`].

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Construction-time configuration for the controller.
pub mod configs;
/// Flagged-event dwell countdown.
pub mod dwell;
/// Error taxonomy for construction, lifecycle and fetch failures.
pub mod errors;
/// Rate-limited wrapper around the live transaction source.
pub mod fetcher;
/// Event, connection state and published snapshot types.
pub mod model;
/// Canned fallback events.
pub mod pool;
/// Inbound payload model and transaction sources.
pub mod retrieve;
/// The orchestrating feed loop.
pub mod scheduler;

#[cfg(feature = "loggers")]
/// Log output setup for hosts embedding the controller.
pub mod loggers;

// --- Public API Re-exports ---
pub use configs::FeedConfig;
pub use errors::{FeedError, FetchFailure};
pub use model::{ConfirmationState, ConnectionState, Event, EventOrigin, FeedSnapshot};
pub use pool::SyntheticPool;
pub use scheduler::{CycleOutcome, FeedScheduler};
