//! Per-feed polling loop.
//!
//! Each enabled feed gets its own loop that polls its client on a fixed
//! interval, applies successful batches to the feed's store, sweeps the
//! store on its own cadence and hands every visible change to the snapshot
//! publisher.

use super::client::FeedClient;
use crate::config::FeedSettings;
use crate::error::FetchError;
use crate::feed::FeedRecord;
use crate::health::SharedHealth;
use crate::snapshot::{LayerContents, SnapshotPublisher};
use crate::store::{SweepReport, TtlStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

type FetchResult = Result<Vec<FeedRecord>, FetchError>;

/// Counts from applying one batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BatchOutcome {
    pub accepted: usize,
    pub rejected: usize,
    pub filtered: usize,
    pub evicted: usize,
}

/// One feed's loop. Owns the feed's store; nothing else writes to it.
pub(crate) struct FeedLoop {
    settings: FeedSettings,
    client: Arc<dyn FeedClient>,
    store: TtlStore,
    publisher: Arc<SnapshotPublisher>,
    health: SharedHealth,
}

impl FeedLoop {
    pub fn new(
        settings: FeedSettings,
        client: Arc<dyn FeedClient>,
        publisher: Arc<SnapshotPublisher>,
        health: SharedHealth,
    ) -> Self {
        let store = TtlStore::from_settings(&settings);
        Self {
            settings,
            client,
            store,
            publisher,
            health,
        }
    }

    /// Spawns the loop. Aborting the returned handle stops polling and drops
    /// the store; a fetch already in flight runs to completion on its own
    /// task and its result is discarded.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let feed = self.settings.feed;
        info!(
            feed = %feed,
            poll_interval_secs = self.settings.poll_interval.as_secs(),
            ttl_secs = self.settings.ttl.as_secs(),
            max_entities = self.settings.max_entities,
            provider = self.settings.source.provider(),
            "Starting feed loop"
        );

        // First poll tick fires immediately
        let mut poll = interval(self.settings.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut sweep = interval(self.settings.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);
        sweep.tick().await; // consume immediate first tick, store is empty

        self.publish(Utc::now());

        let mut in_flight: Option<JoinHandle<FetchResult>> = None;

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    if in_flight.is_some() {
                        debug!(feed = %feed, "Previous fetch still running, skipping tick");
                        continue;
                    }
                    debug!(feed = %feed, "Polling feed");
                    in_flight = Some(self.spawn_fetch());
                }
                _ = sweep.tick() => {
                    let now = Utc::now();
                    let report = self.store.sweep(now);
                    if report.removed() > 0 {
                        debug!(
                            feed = %feed,
                            expired = report.expired,
                            evicted = report.evicted,
                            "Swept store"
                        );
                        self.after_sweep(report, now);
                    }
                }
                result = wait_for_fetch(&mut in_flight) => {
                    in_flight = None;
                    self.handle_result(result, Utc::now());
                }
            }
        }
    }

    fn spawn_fetch(&self) -> JoinHandle<FetchResult> {
        let client = Arc::clone(&self.client);
        let feed = self.settings.feed;
        let timeout = self.settings.fetch_timeout;

        tokio::spawn(async move {
            match tokio::time::timeout(timeout, client.fetch(feed, timeout)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout(timeout)),
            }
        })
    }

    /// Apply one fetch outcome. A failure leaves the store untouched, so the
    /// last known entities keep decaying until their TTL runs out.
    pub(crate) fn handle_result(&mut self, result: FetchResult, now: DateTime<Utc>) {
        let feed = self.settings.feed;
        match result {
            Ok(records) => {
                let received = records.len();
                let outcome = self.apply_batch(records, now);
                self.publish(now);

                {
                    let mut health = self.health.lock();
                    health.record_success(now, self.store.len());
                    health.rejected_entities += outcome.rejected as u64;
                    health.filtered_entities += outcome.filtered as u64;
                    health.evicted_entities += outcome.evicted as u64;
                }

                if outcome.rejected > 0 {
                    warn!(
                        feed = %feed,
                        rejected = outcome.rejected,
                        "Dropped invalid entities from batch"
                    );
                }

                debug!(
                    feed = %feed,
                    received = received,
                    accepted = outcome.accepted,
                    filtered = outcome.filtered,
                    entities = self.store.len(),
                    "Applied batch"
                );
            }
            Err(e) => {
                let failures = {
                    let mut health = self.health.lock();
                    health.record_failure(now, &e);
                    health.consecutive_failures
                };
                warn!(
                    feed = %feed,
                    error = %e,
                    consecutive_failures = failures,
                    entities = self.store.len(),
                    "Fetch failed, keeping last known entities"
                );
            }
        }
    }

    /// Upsert every record in batch order, then sweep.
    ///
    /// Records outside the feed's area are skipped before they reach the
    /// store; invalid records are dropped one by one.
    pub(crate) fn apply_batch(&mut self, records: Vec<FeedRecord>, now: DateTime<Utc>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for record in records {
            let record = record.normalize(now);

            // Malformed positions fall through to the store and are rejected
            if let (Some(area), Some(coordinates)) = (&self.settings.area, &record.coordinates) {
                if coordinates.is_valid() && !area.contains(coordinates) {
                    outcome.filtered += 1;
                    continue;
                }
            }

            match self.store.upsert(record, now) {
                Ok(_) => outcome.accepted += 1,
                Err(e) => {
                    debug!(feed = %self.settings.feed, error = %e, "Rejected entity");
                    outcome.rejected += 1;
                }
            }
        }

        outcome.evicted = self.store.sweep(now).evicted;
        outcome
    }

    fn after_sweep(&mut self, report: SweepReport, now: DateTime<Utc>) {
        self.publish(now);
        let mut health = self.health.lock();
        health.current_entity_count = self.store.len();
        health.evicted_entities += report.evicted as u64;
    }

    fn publish(&self, now: DateTime<Utc>) {
        self.publisher.publish_layer_at(
            self.settings.feed,
            LayerContents {
                ttl: self.settings.ttl,
                decay: self.settings.decay.clone(),
                entities: self.store.snapshot(),
            },
            now,
        );
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &TtlStore {
        &self.store
    }

    #[cfg(test)]
    pub(crate) fn store_mut(&mut self) -> &mut TtlStore {
        &mut self.store
    }
}

/// Resolves when the in-flight fetch finishes; pends forever when idle.
async fn wait_for_fetch(in_flight: &mut Option<JoinHandle<FetchResult>>) -> FetchResult {
    match in_flight {
        Some(handle) => match handle.await {
            Ok(result) => result,
            Err(e) => Err(FetchError::Unavailable(format!("fetch task failed: {}", e))),
        },
        None => std::future::pending().await,
    }
}
