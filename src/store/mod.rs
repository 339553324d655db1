//! Per-feed bounded entity store with TTL expiry.
//!
//! A `TtlStore` is owned by exactly one feed loop, which is its only writer;
//! the rest of the system sees its contents through the copies the loop
//! hands to the snapshot publisher.

use crate::config::FeedSettings;
use crate::error::ValidationError;
use crate::feed::{Entity, FeedKind, FeedRecord};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

#[cfg(test)]
mod tests;

/// What one sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entities older than the TTL
    pub expired: usize,
    /// Entities dropped to get back under `max_entities`
    pub evicted: usize,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.expired + self.evicted
    }
}

pub struct TtlStore {
    feed: FeedKind,
    ttl: Duration,
    max_entities: usize,
    entities: HashMap<String, Entity>,
}

impl TtlStore {
    pub fn new(feed: FeedKind, ttl: Duration, max_entities: usize) -> Self {
        Self {
            feed,
            ttl,
            max_entities,
            entities: HashMap::new(),
        }
    }

    pub fn from_settings(settings: &FeedSettings) -> Self {
        Self::new(settings.feed, settings.ttl, settings.max_entities)
    }

    pub fn feed(&self) -> FeedKind {
        self.feed
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert or replace by id.
    ///
    /// Returns the entity that was replaced, if any. A record without
    /// coordinates or observation time is rejected and the store is left
    /// untouched.
    ///
    /// Redelivery of an observation already held keeps its first receipt
    /// time, so feeds that resend their whole window still decay.
    pub fn upsert(
        &mut self,
        record: FeedRecord,
        now: DateTime<Utc>,
    ) -> Result<Option<Entity>, ValidationError> {
        let mut entity = Entity::from_record(record, now)?;
        if let Some(existing) = self.entities.get(&entity.id) {
            if existing.observed_at == entity.observed_at {
                entity.received_at = existing.received_at;
            }
        }
        Ok(self.entities.insert(entity.id.clone(), entity))
    }

    /// Remove expired entities, then enforce the capacity cap.
    ///
    /// Expiry is strict: an entity exactly `ttl` old survives. Capacity
    /// eviction removes the oldest by `observed_at` first, ties broken by id.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> SweepReport {
        let before = self.entities.len();
        let ttl = self.ttl;
        self.entities
            .retain(|_, entity| entity.observed_age(now) <= ttl);
        let expired = before - self.entities.len();

        let mut evicted = 0;
        if self.entities.len() > self.max_entities {
            let excess = self.entities.len() - self.max_entities;
            let mut by_age: Vec<(DateTime<Utc>, String)> = self
                .entities
                .values()
                .map(|e| (e.observed_at, e.id.clone()))
                .collect();
            by_age.sort();

            for (_, id) in by_age.into_iter().take(excess) {
                self.entities.remove(&id);
                evicted += 1;
            }

            debug!(
                feed = %self.feed,
                evicted = evicted,
                max_entities = self.max_entities,
                "Capacity reached, evicted oldest entities"
            );
        }

        SweepReport { expired, evicted }
    }

    /// Point-in-time copy of the current entities, ordered by id.
    pub fn snapshot(&self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self.entities.values().cloned().collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        entities
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Drop every entity; returns how many were held.
    pub fn clear(&mut self) -> usize {
        let count = self.entities.len();
        self.entities.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
