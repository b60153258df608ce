//! Real clock handler.

use async_trait::async_trait;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tether_core::effects::ClockEffects;

/// [`ClockEffects`] over the system clock and `tokio::time`.
///
/// Sleeps go through tokio's timer, so tests running under paused time get
/// deterministic, auto-advanced delays.
#[derive(Debug, Default, Clone)]
pub struct SystemClock;

impl SystemClock {
    /// Create a clock handler.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ClockEffects for SystemClock {
    async fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }

    async fn sleep_ms(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
