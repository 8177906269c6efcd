//! # Live Source Payload
//!
//! Strongly-typed view of the unconfirmed-transactions JSON:
//!
//! ```json
//! {"txs": [{"hash": "…", "time": 1700000000, "block_height": 820000,
//!           "inputs": [{"prev_out": {"addr": "…", "value": 150000}}],
//!           "out": [{"addr": "…", "value": 120000}]}]}
//! ```
//!
//! Only `txs` is mandatory. Individual transactions missing a hash or an output
//! value are skipped rather than failing the whole page.

use crate::model::ConfirmationState;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

/// Base units (satoshi) per display unit.
pub const BASE_UNITS_PER_COIN: f64 = 100_000_000.0;

/// Top-level response body.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionPage {
    /// Candidate transactions.
    pub txs: Vec<RawTransaction>,
}

/// One transaction as sent by the source.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawTransaction {
    /// Transaction hash.
    pub hash: Option<String>,
    /// Unix seconds.
    pub time: Option<i64>,
    /// Present once mined.
    pub block_height: Option<u64>,
    /// Spent outputs.
    pub inputs: Vec<RawInput>,
    /// Created outputs.
    pub out: Vec<RawOutput>,
}

/// Transaction input.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawInput {
    /// The output being spent.
    pub prev_out: Option<RawOutput>,
}

/// Transaction output.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawOutput {
    /// Address, absent for non-standard scripts.
    pub addr: Option<String>,
    /// Amount in base units.
    pub value: Option<f64>,
}

/// A transaction reduced to what the feed displays.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Transaction hash.
    pub hash: String,
    /// Aggregate output value in display units.
    pub value: f64,
    /// First input address.
    pub from: Option<String>,
    /// First output address.
    pub to: Option<String>,
    /// Source timestamp.
    pub occurred_at: Option<DateTime<Utc>>,
    /// Mempool or block.
    pub confirmation: ConfirmationState,
}

impl RawTransaction {
    /// Reduces the transaction, or `None` when required fields are missing.
    pub fn to_candidate(&self) -> Option<Candidate> {
        let hash = self.hash.as_ref().filter(|h| !h.trim().is_empty())?.clone();
        if self.out.is_empty() {
            return None;
        }

        let mut total = 0.0;
        for output in &self.out {
            let value = output.value.filter(|v| v.is_finite() && *v >= 0.0)?;
            total += value;
        }

        let from = self
            .inputs
            .iter()
            .filter_map(|i| i.prev_out.as_ref())
            .find_map(|o| o.addr.clone());
        let to = self.out.iter().find_map(|o| o.addr.clone());
        let occurred_at = self
            .time
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
        let confirmation = if self.block_height.is_some() {
            ConfirmationState::Confirmed
        } else {
            ConfirmationState::Unconfirmed
        };

        Some(Candidate {
            hash,
            value: total / BASE_UNITS_PER_COIN,
            from,
            to,
            occurred_at,
            confirmation,
        })
    }
}

impl TransactionPage {
    /// Parses a raw body.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    /// All well-formed candidates, in payload order.
    pub fn candidates(&self) -> Vec<Candidate> {
        self.txs.iter().filter_map(RawTransaction::to_candidate).collect()
    }
}
