//! Segment download: HTTP client, retrying fetcher and windowed engine.
//!
//! # Features
//!
//! - Fixed 30s timeout and browser User-Agent on every request
//! - Linear backoff retry (`k * 1s` after attempt `k`), failure as a value
//! - Windowed concurrency with a barrier and a 1s pause between windows
//! - Structured error types with full context
//!
//! # Example
//!
//! ```no_run
//! use segment_downloader::download::{HttpClient, RetryPolicy, SegmentFetcher, SegmentTask};
//!
//! # async fn example() {
//! let fetcher = SegmentFetcher::new(HttpClient::new(), RetryPolicy::default());
//! let result = fetcher
//!     .fetch(&SegmentTask::new("https://cdn.example/seg-1.ts", 1))
//!     .await;
//! println!("success: {}", result.is_success());
//! # }
//! ```

mod client;
pub mod constants;
mod engine;
mod error;
mod fetcher;
mod retry;

pub use client::HttpClient;
pub use constants::{DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, MAX_CONCURRENCY, MIN_CONCURRENCY};
pub use engine::{BatchOutcome, DownloadEngine, EngineError, window_count};
pub use error::DownloadError;
pub use fetcher::{SegmentFailure, SegmentFetcher, SegmentResult, SegmentSuccess, SegmentTask};
pub use retry::{RetryDecision, RetryPolicy, Sleeper, TokioSleeper};
