//! # Data Retrieval Module
//!
//! Everything between the fetcher and the wire: the typed payload model, the
//! [`TransactionSource`] seam, and (with the `retrieve` feature) the
//! reqwest-backed [`HttpSource`](http_source::HttpSource).

/// Typed view of the inbound JSON and candidate extraction.
pub mod payload;
/// The source trait the fetcher talks to.
pub mod source;

#[cfg(feature = "retrieve")]
/// Single-shot GET source built on reqwest.
pub mod http_source;

pub use payload::{Candidate, TransactionPage};
pub use source::TransactionSource;

#[cfg(feature = "retrieve")]
pub use http_source::HttpSource;
