//! Shared User-Agent string for segment and manifest requests.
//!
//! Some media origins reject requests without a browser-like client
//! identifier, so every request carries the same fixed value.

/// Browser User-Agent sent with every segment and manifest request.
pub const SEGMENT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Returns the User-Agent used by the HTTP client.
#[must_use]
pub(crate) fn default_segment_user_agent() -> &'static str {
    SEGMENT_USER_AGENT
}
