//! Rate-limited HTTP fetching with retry/backoff, raw snapshot
//! persistence, and the per-URL health ledger.

pub mod client;
pub mod health;
pub mod limiter;
pub mod snapshots;

pub use client::{FetchOptions, FetchResponse, Fetcher, HeadlessFetcher};
pub use health::{FetchOutcome, HealthLedger, UrlHealth};
pub use limiter::SlidingWindowLimiter;
pub use snapshots::SnapshotWriter;
