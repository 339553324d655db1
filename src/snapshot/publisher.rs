use super::{FeedLayer, RenderedEntity, Snapshot};
use crate::decay::DecayRamp;
use crate::feed::{Entity, FeedKind};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Latest store contents for one feed, as handed over by its loop.
#[derive(Clone, Debug)]
pub struct LayerContents {
    pub ttl: Duration,
    pub decay: DecayRamp,
    pub entities: Vec<Entity>,
}

struct PublisherState {
    layers: BTreeMap<FeedKind, LayerContents>,
    sequence: u64,
}

/// Holds the newest snapshot and republishes it on layer changes and decay
/// ticks.
///
/// Readers get value-replace semantics through a `watch` channel: a slow
/// reader skips intermediate snapshots and only ever sees the newest one.
pub struct SnapshotPublisher {
    state: Mutex<PublisherState>,
    tx: watch::Sender<Arc<Snapshot>>,
}

impl SnapshotPublisher {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(Snapshot::empty(Utc::now())));
        Self {
            state: Mutex::new(PublisherState {
                layers: BTreeMap::new(),
                sequence: 0,
            }),
            tx,
        }
    }

    /// Replace one feed's layer and publish.
    pub fn publish_layer(&self, feed: FeedKind, contents: LayerContents) -> Arc<Snapshot> {
        self.publish_layer_at(feed, contents, Utc::now())
    }

    pub fn publish_layer_at(
        &self,
        feed: FeedKind,
        contents: LayerContents,
        now: DateTime<Utc>,
    ) -> Arc<Snapshot> {
        let mut state = self.state.lock();
        state.layers.insert(feed, contents);
        self.rebuild(&mut state, now)
    }

    /// Drop a feed's layer. Publishes only if the layer existed.
    pub fn remove_layer(&self, feed: FeedKind) -> bool {
        let mut state = self.state.lock();
        if state.layers.remove(&feed).is_none() {
            return false;
        }
        self.rebuild(&mut state, Utc::now());
        true
    }

    /// Recompute decay weights without new data.
    pub fn refresh(&self) -> Arc<Snapshot> {
        self.refresh_at(Utc::now())
    }

    pub fn refresh_at(&self, now: DateTime<Utc>) -> Arc<Snapshot> {
        let mut state = self.state.lock();
        self.rebuild(&mut state, now)
    }

    pub fn latest(&self) -> Arc<Snapshot> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }

    fn rebuild(&self, state: &mut PublisherState, now: DateTime<Utc>) -> Arc<Snapshot> {
        state.sequence += 1;

        let layers = state
            .layers
            .iter()
            .map(|(feed, contents)| (*feed, render_layer(*feed, contents, now)))
            .collect();

        let snapshot = Arc::new(Snapshot {
            sequence: state.sequence,
            generated_at: now,
            layers,
        });

        debug!(
            sequence = snapshot.sequence,
            entities = snapshot.entity_count(),
            "Published snapshot"
        );

        self.tx.send_replace(Arc::clone(&snapshot));
        snapshot
    }
}

impl Default for SnapshotPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Expired entities are hidden even if the next sweep has not run yet.
fn render_layer(feed: FeedKind, contents: &LayerContents, now: DateTime<Utc>) -> FeedLayer {
    let mut entities: Vec<RenderedEntity> = contents
        .entities
        .iter()
        .filter(|e| e.observed_age(now) <= contents.ttl)
        .map(|e| {
            let age = e.receipt_age(now);
            RenderedEntity {
                entity: e.clone(),
                weight: contents.decay.weight(age, contents.ttl),
                age_secs: age.as_secs_f64(),
            }
        })
        .collect();
    entities.sort_by(|a, b| a.entity.id.cmp(&b.entity.id));

    FeedLayer {
        feed,
        ttl_secs: contents.ttl.as_secs(),
        entities,
    }
}
