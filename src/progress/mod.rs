//! Session-scoped progress publishing.
//!
//! A [`ProgressStore`] holds at most one [`ProgressRecord`] per session id.
//! Writers replace the record wholesale; readers either take a snapshot or
//! subscribe to a stream of snapshots that ends after a terminal record
//! (`completed` or `error`) has been delivered and the grace period elapsed.
//!
//! Each session slot is a `tokio::sync::watch` channel, so subscribers are
//! woken on every update instead of polling.
//!
//! Sessions nobody subscribes to are not closed by a stream. Publishing a
//! terminal record sweeps unwatched terminal sessions older than the
//! retention period so the table stays bounded.

mod record;
mod subscription;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::stream::BoxStream;
use tokio::sync::watch;
use tracing::{debug, instrument};

pub use record::{ProgressEvent, ProgressKind, ProgressRecord, percentage};
pub(crate) use record::now_millis;

/// Default wait between delivering a terminal record and closing the stream.
pub const DEFAULT_TERMINAL_GRACE: Duration = Duration::from_secs(1);
/// Default age after which an unwatched terminal session is swept.
pub const DEFAULT_TERMINAL_RETENTION: Duration = Duration::from_secs(10 * 60);

type Slot = watch::Sender<Option<ProgressRecord>>;

/// Process-wide table of per-session progress records.
///
/// Cheap to clone; all clones share the same table.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    sessions: Arc<DashMap<String, Slot>>,
    terminal_grace: Duration,
    terminal_retention: Duration,
}

impl Default for ProgressStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressStore {
    /// Creates an empty store with the default terminal grace period.
    #[must_use]
    pub fn new() -> Self {
        Self::with_terminal_grace(DEFAULT_TERMINAL_GRACE)
    }

    /// Creates an empty store with a custom terminal grace period.
    #[must_use]
    pub fn with_terminal_grace(terminal_grace: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            terminal_grace,
            terminal_retention: DEFAULT_TERMINAL_RETENTION,
        }
    }

    /// Overrides how long an unwatched terminal session is kept.
    #[must_use]
    pub fn with_terminal_retention(mut self, terminal_retention: Duration) -> Self {
        self.terminal_retention = terminal_retention;
        self
    }

    /// Returns the wait applied after a terminal record is delivered.
    #[must_use]
    pub fn terminal_grace(&self) -> Duration {
        self.terminal_grace
    }

    /// Replaces the session's record, creating the session on first use.
    ///
    /// A terminal record first sweeps expired sessions, see
    /// [`ProgressStore::sweep_expired`].
    #[instrument(level = "trace", skip(self, record), fields(kind = ?record.kind))]
    pub fn update(&self, session_id: &str, record: ProgressRecord) {
        if record.kind.is_terminal() {
            self.sweep_expired_at(record.timestamp);
        }
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| watch::channel(None).0)
            .send_replace(Some(record));
    }

    /// Returns the current record for the session, if any.
    #[must_use]
    pub fn snapshot(&self, session_id: &str) -> Option<ProgressRecord> {
        self.sessions
            .get(session_id)
            .and_then(|slot| slot.borrow().clone())
    }

    /// Deletes the session's record. Returns `true` if a slot existed.
    pub fn remove(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            debug!(session_id, "progress session removed");
        }
        removed
    }

    /// Removes sessions whose record is terminal, older than the retention
    /// period and not watched by any subscriber. Returns how many went.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(now_millis())
    }

    fn sweep_expired_at(&self, now: u64) -> usize {
        let retention = u64::try_from(self.terminal_retention.as_millis()).unwrap_or(u64::MAX);
        let before = self.sessions.len();
        self.sessions.retain(|_, slot| {
            let expired = slot.borrow().as_ref().is_some_and(|record| {
                record.kind.is_terminal() && now.saturating_sub(record.timestamp) >= retention
            });
            !expired || slot.receiver_count() > 0
        });
        let swept = before.saturating_sub(self.sessions.len());
        if swept > 0 {
            debug!(swept, "expired progress sessions removed");
        }
        swept
    }

    /// Returns `true` if the session has a slot (with or without a record).
    #[must_use]
    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Number of live session slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no session slots exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Subscribes to the session's progress.
    ///
    /// The stream first yields [`ProgressEvent::Connected`], then the current
    /// record (if one exists) and every later replacement. After yielding a
    /// terminal record it waits for the grace period, deletes the session and
    /// ends. Dropping the stream early also deletes the session; any run that
    /// is still writing to it is not affected.
    #[must_use]
    pub fn subscribe(&self, session_id: &str) -> BoxStream<'static, ProgressEvent> {
        subscription::subscription_stream(self.clone(), session_id.to_string())
    }

    /// Returns a handle that publishes into one session.
    #[must_use]
    pub fn session(&self, session_id: impl Into<String>) -> SessionProgress {
        SessionProgress {
            store: self.clone(),
            session_id: session_id.into(),
        }
    }

    fn watch(&self, session_id: &str) -> watch::Receiver<Option<ProgressRecord>> {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }
}

/// Write handle bound to one session id.
#[derive(Debug, Clone)]
pub struct SessionProgress {
    store: ProgressStore,
    session_id: String,
}

impl SessionProgress {
    /// Returns the session id this handle writes to.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Replaces the session's record.
    pub fn publish(&self, record: ProgressRecord) {
        self.store.update(&self.session_id, record);
    }

    /// Returns the record most recently published to this session.
    #[must_use]
    pub fn current(&self) -> Option<ProgressRecord> {
        self.store.snapshot(&self.session_id)
    }
}
