//! # Feed Scheduler
//!
//! The orchestrating loop of the live feed. It owns the connection state, the
//! "last shown" event and the counters, and publishes a [`FeedSnapshot`] on a
//! `watch` channel every time any of them changes.
//!
//! ## Workflow:
//! 1.  **Start**: publish `Connecting`, run one acquisition cycle immediately,
//!     then arm the cadence timer.
//! 2.  **Acquisition cycle**: ask the fetcher for a live event. On success the
//!     feed is `Live`; on throttle or failure a pool event is used and the feed
//!     is `Fallback` with a readable reason.
//! 3.  **Dedup**: an event with the same id as the one on screen is dropped and
//!     the counters stay untouched.
//! 4.  **Dwell**: an accepted flagged event arms the dwell countdown. Cadence
//!     ticks are skipped until it fires; when it fires one extra cycle runs.
//! 5.  **Stop**: cancel the token (which also aborts an in-flight request), wait
//!     for the loop to hand its state back, publish `Disconnected`.
//!
//! All cycles run inside a single spawned task, so at most one acquisition is
//! in flight at any instant. Manual refreshes are sent to that task over a
//! channel rather than run by the caller.

use crate::configs::FeedConfig;
use crate::dwell::DwellTimer;
use crate::errors::{FeedError, FetchFailure};
use crate::fetcher::{FetchOutcome, RateLimitedFetcher};
use crate::model::{ConnectionState, Event, EventOrigin, FeedSnapshot};
use crate::pool::SyntheticPool;
use crate::retrieve::source::TransactionSource;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// What a single acquisition cycle (or a refresh request) did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new event was published.
    Accepted {
        /// Id of the published event.
        id: String,
        /// Live or synthetic.
        origin: EventOrigin,
        /// Whether it armed the dwell countdown path.
        flagged: bool,
    },
    /// The acquired event matched the one on screen and was dropped.
    Duplicate,
    /// A flagged event is still dwelling; nothing was acquired.
    Deferred,
    /// The feed was stopped while the cycle ran.
    Cancelled,
    /// The scheduler is not running.
    NotRunning,
}

/// Manual refresh, answered once the loop has handled it.
struct RefreshRequest {
    responder: oneshot::Sender<CycleOutcome>,
}

/// Handles of one run, dropped on stop.
struct RunHandle {
    cancel: CancellationToken,
    requests: mpsc::UnboundedSender<RefreshRequest>,
    task: JoinHandle<FeedWorker>,
}

/// State owned by the running loop. Parked in the scheduler between runs.
struct FeedWorker {
    config: FeedConfig,
    fetcher: RateLimitedFetcher,
    pool: SyntheticPool,
    rng: StdRng,
    dwell: DwellTimer,
    current: Option<Arc<Event>>,
    connection: ConnectionState,
    total_events_shown: u64,
    flagged_events_shown: u64,
    last_error: Option<String>,
    state_tx: Arc<watch::Sender<FeedSnapshot>>,
}

impl FeedWorker {
    fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            event: self.current.clone(),
            connection: self.connection,
            total_events_shown: self.total_events_shown,
            flagged_events_shown: self.flagged_events_shown,
            last_error: self.last_error.clone(),
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.snapshot());
    }

    fn set_connection(&mut self, next: ConnectionState) {
        if self.connection != next {
            log::info!("Feed state: {:?} -> {:?}", self.connection, next);
            self.connection = next;
        }
    }

    /// Resets per-run state and publishes the `Connecting` placeholder.
    fn begin_run(&mut self) {
        self.current = None;
        self.total_events_shown = 0;
        self.flagged_events_shown = 0;
        self.last_error = None;
        self.pool.reset();
        self.dwell.cancel();
        self.set_connection(ConnectionState::Connecting);
        self.publish();
    }

    /// One acquisition: live or fallback, dedup, publish, dwell.
    async fn cycle(&mut self, cancel: &CancellationToken) -> CycleOutcome {
        let outcome = self.fetcher.try_fetch_live(&mut self.rng, cancel).await;
        if cancel.is_cancelled() {
            return CycleOutcome::Cancelled;
        }

        let (event, connection, reason) = match outcome {
            FetchOutcome::Event(event) => (event, ConnectionState::Live, None),
            FetchOutcome::Throttled => {
                let reason = match self.fetcher.last_failure() {
                    Some(failure) => fallback_reason(failure),
                    None => "Simulated feed: live source rate limited".to_string(),
                };
                (self.pool.next(), ConnectionState::Fallback, Some(reason))
            }
            FetchOutcome::Failed(failure) => {
                (self.pool.next(), ConnectionState::Fallback, Some(fallback_reason(&failure)))
            }
        };

        let status_changed = self.connection != connection || self.last_error != reason;
        self.set_connection(connection);
        self.last_error = reason;

        if self.current.as_ref().is_some_and(|shown| shown.id == event.id) {
            log::debug!("Discarding duplicate event {}", event.id);
            if status_changed {
                self.publish();
            }
            return CycleOutcome::Duplicate;
        }

        // --- Accept ---
        self.total_events_shown += 1;
        if event.flagged {
            self.flagged_events_shown += 1;
        }

        let event = Arc::new(event);
        self.dwell.on_event_shown(&event);
        let accepted = CycleOutcome::Accepted {
            id: event.id.clone(),
            origin: event.origin,
            flagged: event.flagged,
        };
        self.current = Some(event);
        self.publish();
        accepted
    }

    /// The feed loop. Returns the worker so the scheduler can restart it.
    async fn run(mut self, cancel: CancellationToken, mut requests: mpsc::UnboundedReceiver<RefreshRequest>) -> Self {
        if self.cycle(&cancel).await == CycleOutcome::Cancelled {
            return self.finish();
        }

        let period = self.config.poll_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let dwell_elapsed = self.dwell.expired();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = dwell_elapsed, if self.dwell.is_active() => {
                    // Cleared first so a flagged follow-up can arm a fresh countdown.
                    self.dwell.clear();
                    self.cycle(&cancel).await;
                    // Cadence restarts from the forced acquisition.
                    ticker.reset();
                }
                _ = ticker.tick() => {
                    if self.dwell.is_active() {
                        log::debug!("Cadence tick suppressed by dwell");
                        continue;
                    }
                    self.cycle(&cancel).await;
                }
                Some(request) = requests.recv() => {
                    let outcome = if self.dwell.is_active() {
                        CycleOutcome::Deferred
                    } else {
                        self.cycle(&cancel).await
                    };
                    let _ = request.responder.send(outcome);
                }
            }
        }

        self.finish()
    }

    fn finish(mut self) -> Self {
        log::debug!("Feed run finished after {} live calls in total", self.fetcher.calls_made());
        self.dwell.cancel();
        self.set_connection(ConnectionState::Disconnected);
        self
    }
}

fn fallback_reason(failure: &FetchFailure) -> String {
    format!("Simulated feed: {}", failure)
}

/// # Feed Scheduler
///
/// Public handle of the controller. Construct it once, `start()` it when the
/// feed panel mounts and `stop()` it when it unmounts; observe it through
/// [`subscribe`](Self::subscribe) or [`snapshot`](Self::snapshot).
pub struct FeedScheduler {
    state_tx: Arc<watch::Sender<FeedSnapshot>>,
    worker: Option<FeedWorker>,
    running: Option<RunHandle>,
}

impl FeedScheduler {
    /// Creates a scheduler seeded from the OS random source.
    ///
    /// # Errors
    /// Returns [`FeedError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: FeedConfig, source: Arc<dyn TransactionSource>, pool: SyntheticPool) -> Result<Self, FeedError> {
        Self::with_rng(config, source, pool, StdRng::from_os_rng())
    }

    /// Creates a scheduler with an explicit random source for candidate
    /// selection and flag draws.
    pub fn with_rng(
        config: FeedConfig,
        source: Arc<dyn TransactionSource>,
        pool: SyntheticPool,
        rng: StdRng,
    ) -> Result<Self, FeedError> {
        config.validate()?;

        let (state_tx, _) = watch::channel(FeedSnapshot::disconnected());
        let state_tx = Arc::new(state_tx);

        let worker = FeedWorker {
            fetcher: RateLimitedFetcher::new(source, &config),
            dwell: DwellTimer::new(config.extended_dwell()),
            config,
            pool,
            rng,
            current: None,
            connection: ConnectionState::Disconnected,
            total_events_shown: 0,
            flagged_events_shown: 0,
            last_error: None,
            state_tx: Arc::clone(&state_tx),
        };

        Ok(Self {
            state_tx,
            worker: Some(worker),
            running: None,
        })
    }

    /// Creates a scheduler polling `config.source_url` over HTTP, with the
    /// built-in synthetic pool.
    #[cfg(feature = "retrieve")]
    pub fn from_config(config: FeedConfig) -> Result<Self, FeedError> {
        let source = Arc::new(crate::retrieve::http_source::HttpSource::new(&config)?);
        Self::new(config, source, SyntheticPool::default())
    }

    /// Starts the feed loop on the current tokio runtime.
    ///
    /// Counters and the pool cursor are reset; the fetcher's rate-limit window
    /// carries over from the previous run.
    pub fn start(&mut self) -> Result<(), FeedError> {
        if self.running.is_some() {
            return Err(FeedError::AlreadyRunning);
        }
        let mut worker = self
            .worker
            .take()
            .ok_or_else(|| FeedError::WorkerLost("previous run did not return its state".into()))?;

        worker.begin_run();
        log::info!(
            "Feed scheduler started (cadence {:?}, dwell {:?})",
            worker.config.poll_interval(),
            worker.config.extended_dwell()
        );

        let cancel = CancellationToken::new();
        let (requests, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(worker.run(cancel.clone(), rx));

        self.running = Some(RunHandle { cancel, requests, task });
        Ok(())
    }

    /// Stops the feed loop and publishes `Disconnected`.
    ///
    /// When this returns no timer, dwell countdown or request of the stopped
    /// run can touch the published state any more. Calling it while stopped is
    /// a no-op.
    pub async fn stop(&mut self) {
        let Some(run) = self.running.take() else {
            return;
        };

        run.cancel.cancel();
        drop(run.requests);

        match run.task.await {
            Ok(worker) => self.worker = Some(worker),
            Err(e) => log::error!("Feed worker terminated abnormally: {}", e),
        }

        self.state_tx.send_modify(|snap| {
            snap.connection = ConnectionState::Disconnected;
            snap.last_error = None;
        });
        log::info!("Feed scheduler stopped");
    }

    /// Asks the running loop for an immediate extra cycle.
    ///
    /// The request is served between regular cycles, is still subject to the
    /// fetcher's rate limit, and is answered with [`CycleOutcome::Deferred`]
    /// while a flagged event is dwelling.
    pub async fn refresh(&self) -> CycleOutcome {
        let Some(run) = &self.running else {
            return CycleOutcome::NotRunning;
        };

        let (responder, rx) = oneshot::channel();
        if run.requests.send(RefreshRequest { responder }).is_err() {
            return CycleOutcome::NotRunning;
        }
        rx.await.unwrap_or(CycleOutcome::Cancelled)
    }

    /// True between `start()` and `stop()`.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// A receiver notified on every published change.
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.state_tx.subscribe()
    }

    /// The currently published state.
    pub fn snapshot(&self) -> FeedSnapshot {
        self.state_tx.borrow().clone()
    }
}

impl Drop for FeedScheduler {
    fn drop(&mut self) {
        if let Some(run) = &self.running {
            run.cancel.cancel();
        }
    }
}
