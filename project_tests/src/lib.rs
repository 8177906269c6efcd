//! # Feed Test Fixtures
//!
//! Shared doubles for the scenario tests under `tests/`:
//!
//! - [`ScriptedSource`]: a [`TransactionSource`] replaying a fixed script of
//!   pages and failures, recording when each call started and how many calls
//!   actually ran to completion.
//! - [`page`] / [`page_of`]: build wire payloads without hand-writing JSON.
//! - [`plain_pool`]: a small pool with no flagged entries, so dwell timing in
//!   fallback scenarios stays out of the way.
//! - [`serve_pages`]: a throwaway HTTP server on `127.0.0.1:0`.

#![forbid(unsafe_code)]

use async_trait::async_trait;
use lib_feed::errors::FetchFailure;
use lib_feed::model::ConfirmationState;
use lib_feed::pool::{PoolEntry, SyntheticPool};
use lib_feed::retrieve::{TransactionPage, TransactionSource};
use lib_feed::{FeedConfig, FeedScheduler};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::time::Instant;

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum Step {
    /// Answer with this JSON body.
    Body(String),
    /// Fail with this failure.
    Fail(FetchFailure),
}

/// What the source does once the script runs out.
#[derive(Debug, Clone)]
pub enum Exhausted {
    /// Keep failing.
    Fail(FetchFailure),
    /// Keep answering with a fresh unique transaction of this many base units.
    Unique(u64),
}

/// # Scripted Source
pub struct ScriptedSource {
    script: Mutex<VecDeque<Step>>,
    exhausted: Exhausted,
    delay: Duration,
    started: Mutex<Vec<Instant>>,
    completed: AtomicU64,
}

impl ScriptedSource {
    /// Replays `steps`, then behaves as `exhausted`.
    pub fn new(steps: Vec<Step>, exhausted: Exhausted) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            exhausted,
            delay: Duration::ZERO,
            started: Mutex::new(Vec::new()),
            completed: AtomicU64::new(0),
        })
    }

    /// Always fails with `failure`.
    pub fn failing(failure: FetchFailure) -> Arc<Self> {
        Self::new(Vec::new(), Exhausted::Fail(failure))
    }

    /// A new unique transaction per call.
    pub fn unique(base_units: u64) -> Arc<Self> {
        Self::new(Vec::new(), Exhausted::Unique(base_units))
    }

    /// Unique transactions, each answer delayed by `delay`.
    pub fn slow(base_units: u64, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            exhausted: Exhausted::Unique(base_units),
            delay,
            started: Mutex::new(Vec::new()),
            completed: AtomicU64::new(0),
        })
    }

    /// Number of calls that started.
    pub fn calls(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    /// Start instants of every call.
    pub fn call_times(&self) -> Vec<Instant> {
        self.started.lock().unwrap().clone()
    }

    /// Number of calls that ran to completion (were not dropped mid-flight).
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionSource for ScriptedSource {
    async fn fetch(&self) -> Result<TransactionPage, FetchFailure> {
        let call_index = {
            let mut started = self.started.lock().unwrap();
            started.push(Instant::now());
            started.len() - 1
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let step = self.script.lock().unwrap().pop_front();
        let step = step.unwrap_or_else(|| match &self.exhausted {
            Exhausted::Fail(f) => Step::Fail(f.clone()),
            Exhausted::Unique(units) => Step::Body(page(&format!("tx-{}", call_index), *units)),
        });

        self.completed.fetch_add(1, Ordering::SeqCst);
        match step {
            Step::Body(body) => TransactionPage::from_json(&body).map_err(|e| FetchFailure::Malformed(e.to_string())),
            Step::Fail(f) => Err(f),
        }
    }
}

/// A page holding a single transaction.
pub fn page(hash: &str, base_units: u64) -> String {
    page_of(&[(hash, base_units)])
}

/// A page holding one transaction per `(hash, base_units)` pair.
pub fn page_of(txs: &[(&str, u64)]) -> String {
    let txs: Vec<serde_json::Value> = txs
        .iter()
        .map(|(hash, units)| {
            serde_json::json!({
                "hash": hash,
                "time": 1_700_000_000,
                "inputs": [{"prev_out": {"addr": "1FeedSender", "value": units}}],
                "out": [{"addr": "1FeedReceiver", "value": units}]
            })
        })
        .collect();
    serde_json::json!({ "txs": txs }).to_string()
}

/// Three unflagged entries: `sim-0`, `sim-1`, `sim-2`.
pub fn plain_pool() -> SyntheticPool {
    SyntheticPool::new(vec![
        PoolEntry::new(0.5, "1PoolA", "1PoolB", ConfirmationState::Confirmed),
        PoolEntry::new(1.5, "1PoolC", "1PoolD", ConfirmationState::Unconfirmed),
        PoolEntry::new(2.5, "1PoolE", "1PoolF", ConfirmationState::Confirmed),
    ])
    .expect("pool is not empty")
}

/// Scheduler over `source` with a fixed seed and [`plain_pool`].
pub fn scheduler(config: FeedConfig, source: Arc<ScriptedSource>) -> FeedScheduler {
    FeedScheduler::with_rng(config, source, plain_pool(), StdRng::seed_from_u64(7)).expect("valid config")
}

/// Serves `bodies` in order, one connection each, then stops accepting.
/// Returns the endpoint URL.
pub fn serve_pages(bodies: Vec<String>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to random port");
    let port = listener.local_addr().expect("bound listener has an address").port();

    thread::spawn(move || {
        for body in bodies {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut buf = [0u8; 2048];
            let _ = stream.read(&mut buf);
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });

    format!("http://127.0.0.1:{}/unconfirmed-transactions?format=json", port)
}
