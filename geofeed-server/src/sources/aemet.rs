//! AEMET radar composite frames.
//!
//! The radar images are published on a fixed time grid, so a fetch does not
//! touch the network: it lists the most recent `frame_count` grid slots and
//! builds each frame's image URL from the template.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use geofeed::{Coordinates, EntityAttributes, FeedClient, FeedKind, FeedRecord, FetchError};
use std::time::Duration;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

pub struct AemetRadarClient {
    url_template: String,
    frame_count: u32,
    frame_step_minutes: u32,
    center: Coordinates,
}

impl AemetRadarClient {
    pub fn new(
        url_template: impl Into<String>,
        frame_count: u32,
        frame_step_minutes: u32,
        center: Coordinates,
    ) -> Self {
        Self {
            url_template: url_template.into(),
            frame_count,
            frame_step_minutes,
            center,
        }
    }

    /// Frames available at `now`, oldest first.
    pub fn frames_at(&self, now: DateTime<Utc>) -> Vec<FeedRecord> {
        let step_secs = i64::from(self.frame_step_minutes.max(1)) * 60;
        let latest_secs = now.timestamp() - now.timestamp().rem_euclid(step_secs);
        let Some(latest) = Utc.timestamp_opt(latest_secs, 0).single() else {
            return Vec::new();
        };

        (0..self.frame_count)
            .rev()
            .map(|back| latest - ChronoDuration::seconds(step_secs * i64::from(back)))
            .map(|at| self.frame(at))
            .collect()
    }

    fn frame(&self, at: DateTime<Utc>) -> FeedRecord {
        let stamp = at.format(TIMESTAMP_FORMAT).to_string();
        FeedRecord::new(EntityAttributes::RadarFrame {
            url: self.url_template.replace("{timestamp}", &stamp),
        })
        .with_id(stamp)
        .at(self.center)
        .observed(at)
    }
}

#[async_trait]
impl FeedClient for AemetRadarClient {
    async fn fetch(
        &self,
        _feed: FeedKind,
        _timeout: Duration,
    ) -> Result<Vec<FeedRecord>, FetchError> {
        Ok(self.frames_at(Utc::now()))
    }
}
