//! # Feed Data Model
//!
//! The types that flow out of the controller towards the presentation surface.
//!
//! ## Key Types:
//! - **`Event`**: one displayable transaction, live or synthetic. Once
//!   published it is never mutated; the scheduler shares it as `Arc<Event>` and
//!   replaces the pointer when a new event is accepted.
//! - **`ConnectionState`**: the controller's status towards the outside world.
//! - **`FeedSnapshot`**: everything the surface needs for one render.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Placeholder used when the source omits an address.
pub const UNKNOWN_PARTICIPANT: &str = "Unknown";

/// Whether the transaction was already included in a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfirmationState {
    /// Still in the mempool.
    Unconfirmed,
    /// Included in a block.
    Confirmed,
}

/// Where an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventOrigin {
    /// Picked from the live HTTP source.
    Live,
    /// Produced by the synthetic pool.
    Synthetic,
}

/// Ordered (origin, destination) address pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participants {
    /// Sending address.
    pub from: String,
    /// Receiving address.
    pub to: String,
}

impl Participants {
    /// Builds a pair, substituting [`UNKNOWN_PARTICIPANT`] for missing sides.
    pub fn new(from: Option<String>, to: Option<String>) -> Self {
        Self {
            from: from.unwrap_or_else(|| UNKNOWN_PARTICIPANT.to_string()),
            to: to.unwrap_or_else(|| UNKNOWN_PARTICIPANT.to_string()),
        }
    }
}

/// # Event
///
/// A single transaction-like record accepted for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Transaction hash for live events, `sim-<index>` for pool events.
    pub id: String,
    /// Aggregate output value in display units.
    pub value: f64,
    /// Sender and receiver.
    pub participants: Participants,
    /// When the controller accepted the event, not when it happened on-chain.
    pub observed_at: DateTime<Utc>,
    /// Source timestamp, when the payload carries one.
    pub occurred_at: Option<DateTime<Utc>>,
    /// Mempool or block.
    pub confirmation: ConfirmationState,
    /// High-priority marker driving the extended dwell.
    pub flagged: bool,
    /// Present exactly when `flagged` is true.
    pub flag_reason: Option<String>,
    /// Live or synthetic.
    pub origin: EventOrigin,
}

impl Event {
    /// Marks the event as high priority with the given reason.
    pub fn with_flag(mut self, reason: impl Into<String>) -> Self {
        self.flagged = true;
        self.flag_reason = Some(reason.into());
        self
    }
}

/// Operational states of the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    /// Started, first acquisition not finished yet.
    Connecting,
    /// The last accepted acquisition came from the live source.
    Live,
    /// The live source was throttled or failing; pool events are shown.
    Fallback,
    /// Stopped. Terminal for a run.
    Disconnected,
}

impl ConnectionState {
    /// Status label shown next to the feed.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Live => "Live",
            ConnectionState::Fallback => "Simulated",
            ConnectionState::Disconnected => "Disconnected",
        }
    }

    /// True between `start()` and `stop()`.
    pub fn is_running(&self) -> bool {
        !matches!(self, ConnectionState::Disconnected)
    }
}

/// # Feed Snapshot
///
/// The published state of the controller. A new snapshot is sent on the
/// scheduler's watch channel on every state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSnapshot {
    /// The event currently on screen, if any.
    pub event: Option<Arc<Event>>,
    /// Current connection state.
    pub connection: ConnectionState,
    /// Events accepted since the last start.
    pub total_events_shown: u64,
    /// Flagged events accepted since the last start.
    pub flagged_events_shown: u64,
    /// Reason the feed is in fallback, if any.
    pub last_error: Option<String>,
}

impl FeedSnapshot {
    /// The state before the first start.
    pub fn disconnected() -> Self {
        Self {
            event: None,
            connection: ConnectionState::Disconnected,
            total_events_shown: 0,
            flagged_events_shown: 0,
            last_error: None,
        }
    }

    /// Status label for the current connection state.
    pub fn status_label(&self) -> &'static str {
        self.connection.label()
    }
}

impl Default for FeedSnapshot {
    fn default() -> Self {
        Self::disconnected()
    }
}
