//! Shared helpers for unit tests.

pub mod socket_guard;

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::download::Sleeper;

/// Sleeper that records requested waits and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Every duration passed to `sleep`, in call order.
    pub fn recorded(&self) -> Vec<Duration> {
        self.waits
            .lock()
            .map(|waits| waits.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut waits) = self.waits.lock() {
            waits.push(duration);
        }
    }
}
