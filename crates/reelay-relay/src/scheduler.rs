//! Periodic driver: one tick syncs every profile in configuration order.
//!
//! Ticks never overlap; a slow tick delays the next one. Cancellation is
//! checked before each profile, so shutdown never interrupts a sync midway.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use reelay_core::ProfileStore;

use crate::sync::{sync_profile, ProfileSync, SyncStatus};

/// Counts for one pass over the profile list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub synced: usize,
    pub failed: usize,
    /// Profiles not attempted because shutdown was requested.
    pub skipped: usize,
}

#[derive(Debug)]
pub struct Scheduler<S> {
    sync: ProfileSync,
    store: S,
    interval: Duration,
}

impl<S: ProfileStore> Scheduler<S> {
    /// A zero `interval` is raised to one millisecond.
    #[must_use]
    pub fn new(sync: ProfileSync, store: S, interval: Duration) -> Self {
        Self {
            sync,
            store,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run ticks until `cancel` fires. The first tick starts immediately.
    pub async fn run(&mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "scheduler: started"
        );

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let summary = self.tick_until(&cancel).await;
            tracing::info!(
                synced = summary.synced,
                failed = summary.failed,
                skipped = summary.skipped,
                "scheduler: tick complete"
            );
        }

        tracing::info!("scheduler: stopped");
    }

    /// Run a single pass over every profile.
    pub async fn tick(&mut self) -> TickSummary {
        self.tick_until(&CancellationToken::new()).await
    }

    /// Run a single pass, stopping before the next profile once `cancel` fires.
    pub async fn tick_until(&mut self, cancel: &CancellationToken) -> TickSummary {
        let profiles = self.store.profiles();
        let total = profiles.len();
        let mut summary = TickSummary::default();

        for (done, profile) in profiles.into_iter().enumerate() {
            if cancel.is_cancelled() {
                summary.skipped = total - done;
                tracing::info!(
                    remaining = summary.skipped,
                    "scheduler: shutdown requested, skipping remaining profiles"
                );
                break;
            }

            let tag = profile.tag.clone();
            match sync_profile(&self.sync, &mut self.store, profile).await {
                Ok(report) => {
                    summary.synced += 1;
                    if report.status == SyncStatus::Completed {
                        tracing::debug!(
                            profile = %tag,
                            delivered = report.delivered,
                            skipped = report.skipped,
                            item_errors = report.item_errors,
                            "scheduler: profile synced"
                        );
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(profile = %tag, error = %e, "scheduler: failed to update profile");
                }
            }
        }

        summary
    }
}
