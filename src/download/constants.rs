//! Constants for the download module (timeouts, retry, window pacing).

use std::time::Duration;

/// Per-attempt HTTP timeout for segment and manifest requests (30 seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default maximum attempts per segment, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Linear backoff unit: attempt `k` failing waits `k * RETRY_DELAY_UNIT`.
pub const RETRY_DELAY_UNIT: Duration = Duration::from_millis(1000);

/// Pause inserted between consecutive windows (not after the last one).
pub const BATCH_PAUSE: Duration = Duration::from_secs(1);

/// Minimum allowed window size.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed window size.
pub const MAX_CONCURRENCY: usize = 20;

/// Default window size when a request does not specify one.
pub const DEFAULT_CONCURRENCY: usize = 5;
