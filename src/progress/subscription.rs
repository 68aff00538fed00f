//! Subscription stream over one session's progress slot.

use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use tokio::sync::watch;
use tracing::debug;

use super::{ProgressEvent, ProgressRecord, ProgressStore};

enum Phase {
    Connected,
    Watching,
    Draining,
}

/// Deletes the session when the subscriber goes away before a terminal record.
struct SessionCleanup {
    store: ProgressStore,
    session_id: String,
    armed: bool,
}

impl SessionCleanup {
    fn finish(&mut self) {
        self.armed = false;
        self.store.remove(&self.session_id);
    }
}

impl Drop for SessionCleanup {
    fn drop(&mut self) {
        if self.armed {
            debug!(session_id = %self.session_id, "subscriber detached before terminal state");
            self.store.remove(&self.session_id);
        }
    }
}

struct SubscriptionState {
    receiver: watch::Receiver<Option<ProgressRecord>>,
    phase: Phase,
    cleanup: SessionCleanup,
}

impl SubscriptionState {
    /// Waits for the next published record. `None` once the slot is gone.
    async fn next_record(&mut self) -> Option<ProgressRecord> {
        loop {
            self.receiver.changed().await.ok()?;
            if let Some(record) = self.receiver.borrow_and_update().clone() {
                return Some(record);
            }
        }
    }
}

pub(super) fn subscription_stream(
    store: ProgressStore,
    session_id: String,
) -> BoxStream<'static, ProgressEvent> {
    let mut receiver = store.watch(&session_id);
    if receiver.borrow().is_some() {
        // Deliver the record that already exists as the first snapshot.
        receiver.mark_changed();
    }

    let state = SubscriptionState {
        receiver,
        phase: Phase::Connected,
        cleanup: SessionCleanup {
            store,
            session_id,
            armed: true,
        },
    };

    stream::unfold(state, |mut state| async move {
        match state.phase {
            Phase::Connected => {
                state.phase = Phase::Watching;
                Some((ProgressEvent::Connected, state))
            }
            Phase::Watching => {
                let record = state.next_record().await?;
                if record.kind.is_terminal() {
                    state.phase = Phase::Draining;
                }
                Some((ProgressEvent::Snapshot(record), state))
            }
            Phase::Draining => {
                tokio::time::sleep(state.cleanup.store.terminal_grace()).await;
                state.cleanup.finish();
                None
            }
        }
    })
    .boxed()
}
