//! Local lightning strike generator.
//!
//! Stands in for a real detection network: every fetch records one new
//! strike at a random point in a square around the centre and returns all
//! strikes still inside the retention window.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geofeed::{Coordinates, EntityAttributes, FeedClient, FeedKind, FeedRecord, FetchError};
use parking_lot::Mutex;
use rand::Rng;
use std::time::Duration;

pub struct StrikeSimulator {
    center: Coordinates,
    spread_deg: f64,
    retention: Duration,
    strikes: Mutex<Vec<FeedRecord>>,
}

impl StrikeSimulator {
    pub fn new(center: Coordinates, spread_deg: f64, retention: Duration) -> Self {
        Self {
            center,
            spread_deg,
            retention,
            strikes: Mutex::new(Vec::new()),
        }
    }

    /// Record one strike observed at `now` and return the retained set.
    pub fn tick(&self, now: DateTime<Utc>) -> Vec<FeedRecord> {
        let strike = self.random_strike(now);

        let mut strikes = self.strikes.lock();
        strikes.push(strike);
        strikes.retain(|s| {
            s.observed_at
                .and_then(|at| (now - at).to_std().ok())
                .map_or(true, |age| age <= self.retention)
        });
        strikes.clone()
    }

    fn random_strike(&self, now: DateTime<Utc>) -> FeedRecord {
        let mut rng = rand::thread_rng();
        let lat = self.center.lat + (rng.gen::<f64>() - 0.5) * self.spread_deg;
        let lon = self.center.lon + (rng.gen::<f64>() - 0.5) * self.spread_deg;

        FeedRecord::new(EntityAttributes::Strike {
            amplitude: Some(rng.gen_range(-60.0..60.0)),
            station_count: Some(rng.gen_range(3..20)),
        })
        .at(Coordinates::new(lat.clamp(-90.0, 90.0), lon.clamp(-180.0, 180.0)))
        .observed(now)
    }
}

#[async_trait]
impl FeedClient for StrikeSimulator {
    async fn fetch(
        &self,
        _feed: FeedKind,
        _timeout: Duration,
    ) -> Result<Vec<FeedRecord>, FetchError> {
        Ok(self.tick(Utc::now()))
    }
}
