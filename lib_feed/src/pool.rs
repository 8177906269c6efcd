//! # Synthetic Event Pool
//!
//! Canned transactions shown while the live source is throttled or down.
//! The pool is a fixed ordered list read through a monotonically increasing
//! cursor, so it behaves as an infinite, restartable sequence: entry
//! `cursor % len` is returned and the cursor advances by one.

use crate::errors::FeedError;
use crate::model::{ConfirmationState, Event, EventOrigin, Participants};
use chrono::Utc;

/// A canned record before it is stamped into an [`Event`].
#[derive(Debug, Clone, PartialEq)]
pub struct PoolEntry {
    /// Display value.
    pub value: f64,
    /// Sending address.
    pub from: String,
    /// Receiving address.
    pub to: String,
    /// Confirmation state to report.
    pub confirmation: ConfirmationState,
    /// When set, the event is published flagged with this reason.
    pub flag_reason: Option<String>,
}

impl PoolEntry {
    /// Unflagged entry.
    pub fn new(value: f64, from: &str, to: &str, confirmation: ConfirmationState) -> Self {
        Self {
            value,
            from: from.to_string(),
            to: to.to_string(),
            confirmation,
            flag_reason: None,
        }
    }

    /// Same entry, published flagged.
    pub fn flagged(mut self, reason: &str) -> Self {
        self.flag_reason = Some(reason.to_string());
        self
    }
}

/// # Synthetic Pool
pub struct SyntheticPool {
    entries: Vec<PoolEntry>,
    cursor: u64,
}

impl SyntheticPool {
    /// Builds a pool over `entries`. An empty list is a configuration error.
    pub fn new(entries: Vec<PoolEntry>) -> Result<Self, FeedError> {
        if entries.is_empty() {
            return Err(FeedError::EmptyPool);
        }
        Ok(Self { entries, cursor: 0 })
    }

    /// Returns the next event, wrapping around at the end of the list.
    pub fn next(&mut self) -> Event {
        let index = (self.cursor % self.entries.len() as u64) as usize;
        self.cursor += 1;

        let entry = &self.entries[index];
        let event = Event {
            id: format!("sim-{}", index),
            value: entry.value,
            participants: Participants::new(Some(entry.from.clone()), Some(entry.to.clone())),
            observed_at: Utc::now(),
            occurred_at: None,
            confirmation: entry.confirmation,
            flagged: false,
            flag_reason: None,
            origin: EventOrigin::Synthetic,
        };

        match &entry.flag_reason {
            Some(reason) => event.with_flag(reason.clone()),
            None => event,
        }
    }

    /// Rewinds to the first entry.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Number of calls to [`next`](Self::next) since construction or the last reset.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Number of backing entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True only for an empty pool, which [`new`](Self::new) rejects.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SyntheticPool {
    fn default() -> Self {
        use ConfirmationState::{Confirmed, Unconfirmed};

        let entries = vec![
            PoolEntry::new(0.8421, "bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh", "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2", Unconfirmed),
            PoolEntry::new(3.15, "3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy", "bc1q9h7garjp4x0q5n9r3l2ycrx0vq8l6fqm2kc7hv", Confirmed),
            PoolEntry::new(27.5, "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", "bc1qm34lsc65zpw79lxes69zkqmk6ee3ewf0j77s3h", Unconfirmed)
                .flagged("Anomalous repricing detected on high-value transfer"),
            PoolEntry::new(0.125, "bc1qa5wkgaew2dkv56kfvj49j0av5nml45x9ek9hz6", "3FZbgi29cpjq2GjdwV8eyHuJJnkLtktZc5", Confirmed),
            PoolEntry::new(12.0004, "1KFHE7w8BhaENAswwryaoccDb6qcT6DbYY", "bc1qc7slrfxkknqcq2jevvvkdgvrt8080852dfjewde", Unconfirmed),
            PoolEntry::new(148.9, "bc1qjh0akslml59uuczddqu0y4p3vj64hg5mc94c40", "1Lbcfr7sAHTD9CgdQo3HTMTkV8LK4ZnX71", Confirmed)
                .flagged("Value spike against 24h address history"),
            PoolEntry::new(5.6, "3Cbq7aT1tY8kMxWLbitaG7yT6bPbKChq64", "bc1q34aq5drpuwy3wgl9lhup9892qp6svr8ldzyy7c", Unconfirmed),
            PoolEntry::new(0.4999, "1NDyJtNTjmwk5xPNhjgAMu4HDHigtobu1s", "bc1qwqdg6squsna38e46795at95yu9atm8azzmyvckulcc7kytlcckxswvvzej", Confirmed),
        ];

        Self { entries, cursor: 0 }
    }
}
