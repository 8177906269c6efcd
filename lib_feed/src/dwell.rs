//! # Dwell-Time Manager
//!
//! Keeps flagged events on screen longer than the base cadence without
//! touching the scheduler's main timer. A flagged event arms a one-shot
//! countdown; while it runs the scheduler's regular ticks do not advance the
//! feed, and when it elapses the scheduler runs one extra acquisition.
//!
//! Countdowns never stack: a flagged event arriving while one is active leaves
//! the existing deadline in charge.

use crate::model::Event;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// One-shot countdown owned by the feed loop.
#[derive(Debug)]
pub struct DwellTimer {
    duration: Duration,
    deadline: Option<Instant>,
}

impl DwellTimer {
    /// Creates an idle timer with the given extended dwell.
    pub fn new(duration: Duration) -> Self {
        Self { duration, deadline: None }
    }

    /// Reacts to a newly shown event. Returns true if a countdown was started.
    pub fn on_event_shown(&mut self, event: &Event) -> bool {
        if !event.flagged || self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(Instant::now() + self.duration);
        log::debug!("Holding flagged event {} for {:?}", event.id, self.duration);
        true
    }

    /// True while a countdown is pending.
    pub fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the current countdown elapses.
    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// A future resolving when the current countdown elapses.
    ///
    /// The deadline is captured at call time, so the future does not borrow
    /// the timer. With no countdown active it never resolves.
    pub fn expired(&self) -> impl Future<Output = ()> + Send + 'static {
        let deadline = self.deadline();
        async move {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        }
    }

    /// Marks the countdown as consumed after it fired.
    pub fn clear(&mut self) {
        self.deadline = None;
    }

    /// Drops a pending countdown without firing it.
    pub fn cancel(&mut self) {
        if self.deadline.take().is_some() {
            log::debug!("Dwell countdown cancelled");
        }
    }
}
