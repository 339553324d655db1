//! Per-feed health tracking.
//!
//! Each feed loop holds a handle to its own record and updates it after every
//! fetch; readers copy records out through the [`HealthRegistry`].

use crate::error::{ConfigError, FetchError};
use crate::feed::FeedKind;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// Lifecycle of one feed loop.
///
/// `Disabled → Starting → Polling → Disabled`; `Polling` persists across
/// both successful and failed fetches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedState {
    Disabled,
    Starting,
    Polling,
}

/// Health record for one feed.
#[derive(Clone, Debug, Serialize)]
pub struct FeedHealth {
    pub feed: FeedKind,
    pub state: FeedState,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Reset to zero by the next successful fetch
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub current_entity_count: usize,
    pub last_error: Option<String>,
    /// Records dropped for failing validation
    pub rejected_entities: u64,
    /// Records skipped for falling outside the feed's area
    pub filtered_entities: u64,
    /// Entities dropped by capacity eviction
    pub evicted_entities: u64,
}

impl FeedHealth {
    pub fn new(feed: FeedKind) -> Self {
        Self {
            feed,
            state: FeedState::Disabled,
            last_success_at: None,
            last_failure_at: None,
            consecutive_failures: 0,
            total_failures: 0,
            current_entity_count: 0,
            last_error: None,
            rejected_entities: 0,
            filtered_entities: 0,
            evicted_entities: 0,
        }
    }

    pub fn mark_starting(&mut self) {
        self.state = FeedState::Starting;
        self.current_entity_count = 0;
    }

    pub fn mark_disabled(&mut self) {
        self.state = FeedState::Disabled;
        self.current_entity_count = 0;
    }

    /// The feed could not start; it stays disabled with the reason recorded.
    pub fn record_config_error(&mut self, error: &ConfigError) {
        self.state = FeedState::Disabled;
        self.current_entity_count = 0;
        self.last_error = Some(error.to_string());
    }

    pub fn record_success(&mut self, at: DateTime<Utc>, entity_count: usize) {
        self.state = FeedState::Polling;
        self.last_success_at = Some(at);
        self.consecutive_failures = 0;
        self.last_error = None;
        self.current_entity_count = entity_count;
    }

    /// Store contents are untouched by a failed fetch, so the entity count
    /// is left as is.
    pub fn record_failure(&mut self, at: DateTime<Utc>, error: &FetchError) {
        self.state = FeedState::Polling;
        self.last_failure_at = Some(at);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.total_failures += 1;
        self.last_error = Some(error.to_string());
    }

    pub fn is_healthy(&self) -> bool {
        self.state == FeedState::Polling && self.consecutive_failures == 0
    }
}

/// Health record shared between a feed loop and readers.
pub type SharedHealth = Arc<Mutex<FeedHealth>>;

/// Health records for every known feed, enabled or not.
pub struct HealthRegistry {
    feeds: DashMap<FeedKind, SharedHealth>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        let feeds = DashMap::new();
        for feed in FeedKind::ALL {
            feeds.insert(feed, Arc::new(Mutex::new(FeedHealth::new(feed))));
        }
        Self { feeds }
    }

    /// Handle to the live record for `feed`.
    pub fn handle(&self, feed: FeedKind) -> SharedHealth {
        Arc::clone(
            self.feeds
                .entry(feed)
                .or_insert_with(|| Arc::new(Mutex::new(FeedHealth::new(feed))))
                .value(),
        )
    }

    /// Copy of one feed's record.
    pub fn get(&self, feed: FeedKind) -> FeedHealth {
        self.handle(feed).lock().clone()
    }

    /// Copies of every record, ordered by feed.
    pub fn all(&self) -> Vec<FeedHealth> {
        FeedKind::ALL.into_iter().map(|feed| self.get(feed)).collect()
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_record_is_disabled_and_empty() {
        let health = FeedHealth::new(FeedKind::Ships);
        assert_eq!(health.state, FeedState::Disabled);
        assert!(health.last_success_at.is_none());
        assert_eq!(health.consecutive_failures, 0);
        assert!(!health.is_healthy());
    }

    #[test]
    fn test_failures_accumulate_until_success() {
        let now = Utc::now();
        let mut health = FeedHealth::new(FeedKind::Flights);
        health.mark_starting();
        assert_eq!(health.state, FeedState::Starting);

        health.record_success(now, 12);
        health.record_failure(now, &FetchError::Timeout(Duration::from_secs(6)));
        health.record_failure(now, &FetchError::Network("connection refused".into()));

        assert_eq!(health.state, FeedState::Polling);
        assert_eq!(health.consecutive_failures, 2);
        assert_eq!(health.total_failures, 2);
        assert_eq!(health.current_entity_count, 12);
        assert!(health.last_error.as_deref().unwrap().contains("connection refused"));

        health.record_success(now, 3);
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.total_failures, 2);
        assert!(health.last_error.is_none());
        assert!(health.is_healthy());
    }

    #[test]
    fn test_disable_resets_count_but_keeps_history() {
        let now = Utc::now();
        let mut health = FeedHealth::new(FeedKind::Lightning);
        health.record_success(now, 40);
        health.mark_disabled();

        assert_eq!(health.state, FeedState::Disabled);
        assert_eq!(health.current_entity_count, 0);
        assert_eq!(health.last_success_at, Some(now));
    }

    #[test]
    fn test_registry_covers_every_feed() {
        let registry = HealthRegistry::new();
        let all = registry.all();
        assert_eq!(all.len(), 4);
        assert!(all.iter().all(|h| h.state == FeedState::Disabled));
        assert_eq!(all[0].feed, FeedKind::Ships);
    }

    #[test]
    fn test_registry_handles_share_one_record() {
        let registry = HealthRegistry::new();
        registry.handle(FeedKind::Radar).lock().record_success(Utc::now(), 6);
        assert_eq!(registry.get(FeedKind::Radar).current_entity_count, 6);
    }

    #[test]
    fn test_health_serializes_state_in_snake_case() {
        let json = serde_json::to_value(FeedHealth::new(FeedKind::Radar)).unwrap();
        assert_eq!(json["state"], "disabled");
        assert_eq!(json["feed"], "radar");
    }
}
