//! Feed identifiers and the entity model shared by every layer.

mod area;

pub use area::{haversine_km, AreaFilter, BoundingBox};

use crate::error::{FeedError, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;


/// One external live-data source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    Ships,
    Flights,
    Lightning,
    Radar,
}

impl FeedKind {
    pub const ALL: [FeedKind; 4] = [
        FeedKind::Ships,
        FeedKind::Flights,
        FeedKind::Lightning,
        FeedKind::Radar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::Ships => "ships",
            FeedKind::Flights => "flights",
            FeedKind::Lightning => "lightning",
            FeedKind::Radar => "radar",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedKind {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeedKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FeedError::UnknownFeed(s.to_string()))
    }
}

/// WGS84 position in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True when both components are finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Feed-specific typed fields carried by an entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityAttributes {
    Ship {
        name: Option<String>,
        /// Speed over ground
        speed_knots: Option<f64>,
        /// Course over ground
        course_deg: Option<f64>,
        heading_deg: Option<f64>,
    },
    Aircraft {
        callsign: Option<String>,
        origin_country: Option<String>,
        altitude_m: Option<f64>,
        velocity_ms: Option<f64>,
        heading_deg: Option<f64>,
        on_ground: bool,
    },
    Strike {
        amplitude: Option<f64>,
        station_count: Option<u32>,
    },
    RadarFrame {
        url: String,
    },
}

/// Record as returned by a feed client, before validation.
///
/// Clients fill in whatever the upstream provides; `normalize` applies the
/// receipt-time defaults and `Entity::from_record` enforces the invariants.
#[derive(Clone, Debug, PartialEq)]
pub struct FeedRecord {
    pub id: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub attributes: EntityAttributes,
    pub observed_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
}

impl FeedRecord {
    pub fn new(attributes: EntityAttributes) -> Self {
        Self {
            id: None,
            coordinates: None,
            attributes,
            observed_at: None,
            received_at: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn at(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    pub fn observed(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = Some(observed_at);
        self
    }

    /// Fill receipt-time defaults.
    ///
    /// `observed_at` falls back to the receipt time, and records without an
    /// identity get a synthetic key derived from position and observation
    /// time so the same point event replaces itself across polls.
    pub fn normalize(mut self, now: DateTime<Utc>) -> Self {
        let received_at = *self.received_at.get_or_insert(now);
        if self.observed_at.is_none() {
            self.observed_at = Some(received_at);
        }

        let missing_id = self.id.as_deref().map_or(true, |id| id.trim().is_empty());
        if missing_id {
            if let (Some(coordinates), Some(observed_at)) = (self.coordinates, self.observed_at) {
                self.id = Some(synthetic_id(&coordinates, observed_at));
            }
        }
        self
    }
}

/// Key for point events that carry no identity of their own.
pub fn synthetic_id(coordinates: &Coordinates, observed_at: DateTime<Utc>) -> String {
    format!(
        "{:.5},{:.5}@{}",
        coordinates.lat,
        coordinates.lon,
        observed_at.timestamp_millis()
    )
}

/// One live-tracked object held by a feed's store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Feed-scoped unique key (MMSI, ICAO24, synthetic key)
    pub id: String,

    pub coordinates: Coordinates,

    pub attributes: EntityAttributes,

    /// Feed-supplied event time, or receipt time when the feed omits it
    pub observed_at: DateTime<Utc>,

    /// Local receipt time
    pub received_at: DateTime<Utc>,
}

impl Entity {
    /// Validate a record and stamp its receipt time.
    pub fn from_record(record: FeedRecord, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        let id = match record.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => return Err(ValidationError::MissingId),
        };

        let coordinates = record
            .coordinates
            .ok_or_else(|| ValidationError::MissingCoordinates { id: id.clone() })?;

        if !coordinates.is_valid() {
            return Err(ValidationError::CoordinatesOutOfRange {
                id,
                lat: coordinates.lat,
                lon: coordinates.lon,
            });
        }

        let observed_at = record
            .observed_at
            .ok_or_else(|| ValidationError::MissingObservedAt { id: id.clone() })?;

        Ok(Self {
            id,
            coordinates,
            attributes: record.attributes,
            observed_at,
            received_at: record.received_at.unwrap_or(now),
        })
    }

    /// Time since the feed observed this entity (zero if in the future).
    pub fn observed_age(&self, now: DateTime<Utc>) -> Duration {
        age_between(self.observed_at, now)
    }

    /// Time since this process received the entity (zero if in the future).
    pub fn receipt_age(&self, now: DateTime<Utc>) -> Duration {
        age_between(self.received_at, now)
    }
}

fn age_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
    (to - from).to_std().unwrap_or(Duration::ZERO)
}
