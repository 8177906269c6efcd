//! # Transaction Source
//!
//! The seam between the fetcher and the network. Production code uses the
//! reqwest-backed `HttpSource`; tests plug in scripted sources.

use crate::errors::FetchFailure;
use crate::retrieve::payload::TransactionPage;
use async_trait::async_trait;

/// Something that can produce one page of candidate transactions.
///
/// Implementations perform exactly one request per call and never retry;
/// pacing and timeouts are the fetcher's job.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Fetches and parses one page.
    async fn fetch(&self) -> Result<TransactionPage, FetchFailure>;
}
