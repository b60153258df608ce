//! Clock trait definition.
//!
//! Delay is the one time primitive this core needs: debounce and timeout
//! behavior are built by composing a suspended delay with cancel-in-flight
//! registration, so the clock stays a swappable effect rather than a direct
//! `tokio::time` dependency.

use async_trait::async_trait;
use std::sync::Arc;

/// Wall-clock reads and suspensions.
#[async_trait]
pub trait ClockEffects: Send + Sync {
    /// Milliseconds since the Unix epoch.
    async fn now_ms(&self) -> u64;

    /// Suspend the calling task for `ms` milliseconds.
    async fn sleep_ms(&self, ms: u64);
}

/// Blanket implementation for Arc<T> where T: ClockEffects
#[async_trait]
impl<T: ClockEffects + ?Sized> ClockEffects for Arc<T> {
    async fn now_ms(&self) -> u64 {
        (**self).now_ms().await
    }

    async fn sleep_ms(&self, ms: u64) {
        (**self).sleep_ms(ms).await;
    }
}
