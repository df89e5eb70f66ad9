//! Periodic removal of finished jobs

use chrono::{DateTime, Utc};
use std::time::Duration;

use super::job_store::JobStore;

/// Evicts completed/failed jobs once they are older than the retention window.
///
/// Pending and processing jobs are never touched, whatever their age.
pub struct Janitor {
    store: JobStore,
    interval: Duration,
    retention: Duration,
}

impl Janitor {
    pub fn new(store: JobStore, interval: Duration, retention: Duration) -> Self {
        Self {
            store,
            interval,
            retention,
        }
    }

    /// Sweep forever; the first sweep happens one interval after start
    pub async fn run(self) {
        tracing::info!(
            "Janitor started: every {}s, keeping finished jobs for {}s",
            self.interval.as_secs(),
            self.retention.as_secs()
        );

        let period = self.interval.max(Duration::from_millis(1));
        let start = tokio::time::Instant::now() + period;
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.sweep();
        }
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    /// Remove terminal jobs created before `now - retention`
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let cutoff = chrono::Duration::from_std(self.retention)
            .ok()
            .and_then(|retention| now.checked_sub_signed(retention))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let removed = self.store.prune_terminal_before(cutoff);
        if removed > 0 {
            tracing::info!("Cleaned up {} old jobs", removed);
        }
        removed
    }
}
