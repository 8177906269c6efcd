//! # Rate-Limited Fetcher
//!
//! Wraps the live [`TransactionSource`] with the pacing and filtering rules of
//! the feed:
//!
//! 1.  **Throttle**: a real call is only made if at least `min_call_interval`
//!     elapsed since the previous *attempt*. Inside the window the fetcher
//!     answers [`FetchOutcome::Throttled`] at once. The timestamp is taken when
//!     an attempt starts, so failures are paced exactly like successes.
//! 2.  **Bounded call**: the request is raced against the fetch timeout and the
//!     feed's cancellation token.
//! 3.  **Filter & pick**: candidates outside the inclusive value range are
//!     dropped, one of the rest is chosen uniformly at random.
//! 4.  **Flag**: the chosen event is flagged when its value exceeds the
//!     high-value threshold *and* an independent draw lands under the flag
//!     probability. This is a display heuristic only, not an on-chain check.
//!
//! Nothing in here returns an error: every failure ends up as
//! [`FetchOutcome::Failed`] and is remembered in [`RateLimitedFetcher::last_failure`].

use crate::configs::FeedConfig;
use crate::errors::FetchFailure;
use crate::model::{Event, EventOrigin, Participants};
use crate::retrieve::payload::Candidate;
use crate::retrieve::source::TransactionSource;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Result of one [`RateLimitedFetcher::try_fetch_live`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// A qualifying live event.
    Event(Event),
    /// Suppressed by the rate limiter; no request was made.
    Throttled,
    /// A request was made and produced nothing usable.
    Failed(FetchFailure),
}

/// # Rate-Limited Fetcher
pub struct RateLimitedFetcher {
    source: Arc<dyn TransactionSource>,
    min_call_interval: Duration,
    fetch_timeout: Duration,
    value_range: (f64, f64),
    high_value_threshold: f64,
    flag_probability: f64,
    /// Start of the last real attempt.
    last_call: Option<Instant>,
    last_failure: Option<FetchFailure>,
    calls_made: u64,
}

impl RateLimitedFetcher {
    /// Creates a fetcher over `source` using the pacing and filter values of `config`.
    pub fn new(source: Arc<dyn TransactionSource>, config: &FeedConfig) -> Self {
        Self {
            source,
            min_call_interval: config.min_call_interval(),
            fetch_timeout: config.fetch_timeout(),
            value_range: config.value_range,
            high_value_threshold: config.high_value_threshold,
            flag_probability: config.flag_probability,
            last_call: None,
            last_failure: None,
            calls_made: 0,
        }
    }

    /// True when a call now would be suppressed.
    fn is_throttled(&self) -> bool {
        match self.last_call {
            Some(last) => last.elapsed() < self.min_call_interval,
            None => false,
        }
    }

    /// The failure recorded by the most recent attempt, cleared by a success.
    pub fn last_failure(&self) -> Option<&FetchFailure> {
        self.last_failure.as_ref()
    }

    /// Number of real requests issued so far.
    pub(crate) fn calls_made(&self) -> u64 {
        self.calls_made
    }

    /// # Try Fetch Live
    ///
    /// Attempts to obtain one live event. See the module docs for the rules.
    /// `cancel` aborts an in-flight request; the outcome is then
    /// `Failed(Cancelled)` and nothing is recorded.
    pub async fn try_fetch_live(&mut self, rng: &mut StdRng, cancel: &CancellationToken) -> FetchOutcome {
        if self.is_throttled() {
            log::debug!("Live fetch throttled (min interval {:?})", self.min_call_interval);
            return FetchOutcome::Throttled;
        }

        // --- Phase 1: Stamp the attempt ---
        self.last_call = Some(Instant::now());
        self.calls_made += 1;

        // --- Phase 2: Bounded request ---
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchFailure::Cancelled),
            res = tokio::time::timeout(self.fetch_timeout, self.source.fetch()) => match res {
                Ok(inner) => inner,
                Err(_) => Err(FetchFailure::Timeout(self.fetch_timeout.as_millis() as u64)),
            },
        };

        let page = match result {
            Ok(page) => page,
            Err(FetchFailure::Cancelled) => return FetchOutcome::Failed(FetchFailure::Cancelled),
            Err(failure) => return self.fail(failure),
        };

        // --- Phase 3: Filter & pick ---
        let mut candidates: Vec<Candidate> = page
            .candidates()
            .into_iter()
            .filter(|c| self.in_range(c.value))
            .collect();

        if candidates.is_empty() {
            return self.fail(FetchFailure::NoCandidates);
        }

        let picked = candidates.swap_remove(rng.random_range(0..candidates.len()));

        // --- Phase 4: Map & flag ---
        let event = self.to_event(picked, rng);
        self.last_failure = None;
        FetchOutcome::Event(event)
    }

    fn in_range(&self, value: f64) -> bool {
        let (min, max) = self.value_range;
        value >= min && value <= max
    }

    fn fail(&mut self, failure: FetchFailure) -> FetchOutcome {
        log::warn!("Live fetch failed: {}", failure);
        self.last_failure = Some(failure.clone());
        FetchOutcome::Failed(failure)
    }

    fn to_event(&self, candidate: Candidate, rng: &mut StdRng) -> Event {
        let value = candidate.value;
        let event = Event {
            id: candidate.hash,
            value,
            participants: Participants::new(candidate.from, candidate.to),
            observed_at: Utc::now(),
            occurred_at: candidate.occurred_at,
            confirmation: candidate.confirmation,
            flagged: false,
            flag_reason: None,
            origin: EventOrigin::Live,
        };

        if value > self.high_value_threshold && rng.random::<f64>() < self.flag_probability {
            event.with_flag(format!("Anomalous repricing detected on {:.4} transfer", value))
        } else {
            event
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieve::payload::TransactionPage;
    use crate::retrieve::source::TransactionSource;
    use async_trait::async_trait;
    use rand::SeedableRng;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted results, then keeps failing with a transport error.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<&'static str, FetchFailure>>>,
        delay: Duration,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<&'static str, FetchFailure>>) -> Arc<Self> {
            Arc::new(Self { script: Mutex::new(script.into()), delay: Duration::ZERO })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self { script: Mutex::new(VecDeque::new()), delay })
        }
    }

    #[async_trait]
    impl TransactionSource for ScriptedSource {
        async fn fetch(&self) -> Result<TransactionPage, FetchFailure> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(body)) => TransactionPage::from_json(body).map_err(|e| FetchFailure::Malformed(e.to_string())),
                Some(Err(e)) => Err(e),
                None => Err(FetchFailure::Transport("script exhausted".into())),
            }
        }
    }

    const ONE_SMALL: &str = r#"{"txs":[{"hash":"small","out":[{"addr":"1A","value":50000000}]}]}"#;
    const ONE_LARGE: &str = r#"{"txs":[{"hash":"large","out":[{"addr":"1B","value":1500000000}]}]}"#;
    const OUT_OF_RANGE: &str = r#"{"txs":[{"hash":"dust","out":[{"value":1000}]},{"hash":"whale","out":[{"value":90000000000}]}]}"#;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_inside_window_is_throttled() {
        let source = ScriptedSource::new(vec![Ok(ONE_SMALL), Ok(ONE_SMALL)]);
        let mut fetcher = RateLimitedFetcher::new(source, &FeedConfig::default());
        let cancel = CancellationToken::new();
        let mut rng = rng();

        assert!(matches!(fetcher.try_fetch_live(&mut rng, &cancel).await, FetchOutcome::Event(_)));
        tokio::time::advance(Duration::from_millis(4_999)).await;
        assert_eq!(fetcher.try_fetch_live(&mut rng, &cancel).await, FetchOutcome::Throttled);
        assert_eq!(fetcher.calls_made(), 1);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(matches!(fetcher.try_fetch_live(&mut rng, &cancel).await, FetchOutcome::Event(_)));
        assert_eq!(fetcher.calls_made(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_attempt_still_starts_window() {
        let source = ScriptedSource::new(vec![Err(FetchFailure::HttpStatus(500)), Ok(ONE_SMALL)]);
        let mut fetcher = RateLimitedFetcher::new(source, &FeedConfig::default());
        let cancel = CancellationToken::new();
        let mut rng = rng();

        assert_eq!(
            fetcher.try_fetch_live(&mut rng, &cancel).await,
            FetchOutcome::Failed(FetchFailure::HttpStatus(500))
        );
        assert_eq!(fetcher.last_failure(), Some(&FetchFailure::HttpStatus(500)));
        assert_eq!(fetcher.try_fetch_live(&mut rng, &cancel).await, FetchOutcome::Throttled);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(matches!(fetcher.try_fetch_live(&mut rng, &cancel).await, FetchOutcome::Event(_)));
        assert_eq!(fetcher.last_failure(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_candidates_yield_no_candidates() {
        let source = ScriptedSource::new(vec![Ok(OUT_OF_RANGE)]);
        let mut fetcher = RateLimitedFetcher::new(source, &FeedConfig::default());
        let outcome = fetcher.try_fetch_live(&mut rng(), &CancellationToken::new()).await;
        assert_eq!(outcome, FetchOutcome::Failed(FetchFailure::NoCandidates));
    }

    #[test]
    fn test_value_range_is_inclusive() {
        let fetcher = RateLimitedFetcher::new(ScriptedSource::new(Vec::new()), &FeedConfig::default());
        assert!(fetcher.in_range(0.1));
        assert!(fetcher.in_range(500.0));
        assert!(!fetcher.in_range(0.09));
        assert!(!fetcher.in_range(500.01));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_times_out() {
        let config = FeedConfig::default();
        let mut fetcher = RateLimitedFetcher::new(ScriptedSource::slow(Duration::from_secs(10)), &config);
        let outcome = fetcher.try_fetch_live(&mut rng(), &CancellationToken::new()).await;
        assert_eq!(outcome, FetchOutcome::Failed(FetchFailure::Timeout(3_000)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_in_flight_request() {
        let mut fetcher = RateLimitedFetcher::new(ScriptedSource::slow(Duration::from_secs(2)), &FeedConfig::default());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let outcome = fetcher.try_fetch_live(&mut rng(), &cancel).await;
        assert_eq!(outcome, FetchOutcome::Failed(FetchFailure::Cancelled));
        assert_eq!(fetcher.last_failure(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flagging_requires_threshold_and_draw() {
        let always = FeedConfig { flag_probability: 1.0, ..FeedConfig::default() };
        let source = ScriptedSource::new(vec![Ok(ONE_LARGE)]);
        let mut fetcher = RateLimitedFetcher::new(source, &always);
        match fetcher.try_fetch_live(&mut rng(), &CancellationToken::new()).await {
            FetchOutcome::Event(e) => {
                assert!((e.value - 15.0).abs() < 1e-9);
                assert!(e.flagged);
                assert!(e.flag_reason.is_some());
                assert_eq!(e.origin, EventOrigin::Live);
            }
            other => panic!("expected event, got {:?}", other),
        }

        // Below the threshold the draw never matters.
        let source = ScriptedSource::new(vec![Ok(ONE_SMALL)]);
        let mut fetcher = RateLimitedFetcher::new(source, &always);
        match fetcher.try_fetch_live(&mut rng(), &CancellationToken::new()).await {
            FetchOutcome::Event(e) => assert!(!e.flagged && e.flag_reason.is_none()),
            other => panic!("expected event, got {:?}", other),
        }

        let never = FeedConfig { flag_probability: 0.0, ..FeedConfig::default() };
        let source = ScriptedSource::new(vec![Ok(ONE_LARGE)]);
        let mut fetcher = RateLimitedFetcher::new(source, &never);
        match fetcher.try_fetch_live(&mut rng(), &CancellationToken::new()).await {
            FetchOutcome::Event(e) => assert!(!e.flagged),
            other => panic!("expected event, got {:?}", other),
        }
    }
}
