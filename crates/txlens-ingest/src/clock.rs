//! Injectable clock so tests run ingestion without wall-clock delay.

use std::time::Duration;

use async_trait::async_trait;

/// Suspension point between time steps.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real clock backed by the tokio timer.
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that never sleeps. Deterministic runs in tests and offline use.
pub struct NoopClock;

#[async_trait]
impl Clock for NoopClock {
    async fn sleep(&self, _duration: Duration) {}
}
