//! Periodic janitor - sweeps the dedup cache on a fixed period

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::deduplicator::DedupCache;

/// Handle to the background sweep task; aborts the task on drop
pub struct Janitor {
    handle: JoinHandle<()>,
    period: Duration,
}

impl Janitor {
    /// Spawn the sweep task; the first sweep runs one `period` from now
    pub fn spawn(cache: Arc<DedupCache>, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let stats = cache.sweep();
                debug!(remaining = stats.remaining, "Janitor pass complete");
            }
        });

        info!(period_secs = period.as_secs(), "Dedup janitor scheduled");
        Self { handle, period }
    }

    /// Time between sweeps
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether the sweep task is still alive
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Abort the sweep task; safe to call more than once
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
