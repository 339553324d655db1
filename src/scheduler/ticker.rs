use crate::snapshot::SnapshotPublisher;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

/// Republish the snapshot on a fixed cadence so decay weights advance
/// between polls.
pub(crate) fn spawn_decay_ticker(
    publisher: Arc<SnapshotPublisher>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_ms = period.as_millis() as u64, "Starting decay ticker");

        let mut ticker = interval(period);
        // Skip missed ticks to prevent redraw backlog
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await; // first tick is immediate, nothing to decay yet

        loop {
            ticker.tick().await;
            publisher.refresh();
        }
    })
}
