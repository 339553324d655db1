mod source;

pub use source::SourceConfig;

use crate::decay::DecayRamp;
use crate::error::ConfigError;
use crate::feed::{AreaFilter, BoundingBox, FeedKind};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete geofeed configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeofeedConfig {
    #[serde(default)]
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub feeds: FeedsConfig,
}

impl GeofeedConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse geofeed configuration")
    }
}

/// Snapshot publisher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// How often visual decay is recomputed (milliseconds)
    #[serde(default = "default_decay_interval_ms")]
    pub decay_interval_ms: u64,
}

fn default_decay_interval_ms() -> u64 {
    1000
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            decay_interval_ms: default_decay_interval_ms(),
        }
    }
}

impl PublisherConfig {
    /// Decay redraw cadence; a zero value falls back to the default.
    pub fn decay_interval(&self) -> Duration {
        match self.decay_interval_ms {
            0 => Duration::from_millis(default_decay_interval_ms()),
            ms => Duration::from_millis(ms),
        }
    }
}

/// Per-feed configuration sections. Absent sections use per-feed defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsConfig {
    #[serde(default = "FeedConfig::ships")]
    pub ships: FeedConfig,
    #[serde(default = "FeedConfig::flights")]
    pub flights: FeedConfig,
    #[serde(default = "FeedConfig::lightning")]
    pub lightning: FeedConfig,
    #[serde(default = "FeedConfig::radar")]
    pub radar: FeedConfig,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            ships: FeedConfig::ships(),
            flights: FeedConfig::flights(),
            lightning: FeedConfig::lightning(),
            radar: FeedConfig::radar(),
        }
    }
}

impl FeedsConfig {
    pub fn get(&self, feed: FeedKind) -> &FeedConfig {
        match feed {
            FeedKind::Ships => &self.ships,
            FeedKind::Flights => &self.flights,
            FeedKind::Lightning => &self.lightning,
            FeedKind::Radar => &self.radar,
        }
    }

    pub fn get_mut(&mut self, feed: FeedKind) -> &mut FeedConfig {
        match feed {
            FeedKind::Ships => &mut self.ships,
            FeedKind::Flights => &mut self.flights,
            FeedKind::Lightning => &mut self.lightning,
            FeedKind::Radar => &mut self.radar,
        }
    }
}

/// Raw, unvalidated configuration for one feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Fixed poll cadence for the lifetime of one feed loop (seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Entities older than this are evicted (seconds)
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Hard cap; oldest-by-observation evicted first
    #[serde(default = "default_max_entities")]
    pub max_entities: usize,

    /// Deadline handed to the feed client for each fetch (seconds)
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Cadence of the TTL sweep, independent of polling (seconds)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default)]
    pub area: Option<AreaFilter>,

    #[serde(default)]
    pub decay: DecayRamp,

    #[serde(default)]
    pub source: Option<SourceConfig>,
}

fn default_enabled() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_ttl_secs() -> u64 {
    120
}

fn default_max_entities() -> usize {
    1000
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_sweep_interval_secs() -> u64 {
    5
}

/// Coastal box the kiosk watches by default.
fn default_bbox() -> BoundingBox {
    BoundingBox::new(-1.0, 38.0, 1.5, 41.0)
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            poll_interval_secs: default_poll_interval_secs(),
            ttl_secs: default_ttl_secs(),
            max_entities: default_max_entities(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            area: None,
            decay: DecayRamp::default(),
            source: None,
        }
    }
}

impl FeedConfig {
    /// Ships need an upstream GeoJSON relay, so they start disabled.
    pub fn ships() -> Self {
        Self {
            enabled: false,
            poll_interval_secs: 10,
            ttl_secs: 120,
            max_entities: 2000,
            area: Some(AreaFilter::BoundingBox(default_bbox())),
            ..Self::default()
        }
    }

    pub fn flights() -> Self {
        Self {
            poll_interval_secs: 8,
            ttl_secs: 30,
            max_entities: 1000,
            fetch_timeout_secs: 6,
            area: Some(AreaFilter::BoundingBox(default_bbox())),
            source: Some(SourceConfig::open_sky()),
            ..Self::default()
        }
    }

    pub fn lightning() -> Self {
        Self {
            poll_interval_secs: 3,
            ttl_secs: 600,
            max_entities: 3000,
            fetch_timeout_secs: 3,
            source: Some(SourceConfig::strike_simulator()),
            ..Self::default()
        }
    }

    pub fn radar() -> Self {
        Self {
            poll_interval_secs: 300,
            ttl_secs: 3600,
            max_entities: 6,
            sweep_interval_secs: 60,
            source: Some(SourceConfig::aemet_radar()),
            ..Self::default()
        }
    }

    /// Validate into the typed settings a feed loop runs with.
    pub fn validate(&self, feed: FeedKind) -> Result<FeedSettings, ConfigError> {
        let positive = |value: u64, field: &'static str| {
            if value == 0 {
                Err(ConfigError::ZeroValue { feed, field })
            } else {
                Ok(Duration::from_secs(value))
            }
        };

        let poll_interval = positive(self.poll_interval_secs, "poll_interval_secs")?;
        let ttl = positive(self.ttl_secs, "ttl_secs")?;
        let fetch_timeout = positive(self.fetch_timeout_secs, "fetch_timeout_secs")?;
        let sweep_interval = positive(self.sweep_interval_secs, "sweep_interval_secs")?;

        if self.max_entities == 0 {
            return Err(ConfigError::ZeroValue {
                feed,
                field: "max_entities",
            });
        }

        if let Some(area) = &self.area {
            area.check()
                .map_err(|reason| ConfigError::InvalidArea { feed, reason })?;
        }

        self.decay
            .check()
            .map_err(|reason| ConfigError::InvalidDecayRamp { feed, reason })?;

        let source = self
            .source
            .clone()
            .ok_or(ConfigError::MissingSource { feed })?;
        source.check(feed)?;

        Ok(FeedSettings {
            feed,
            poll_interval,
            ttl,
            max_entities: self.max_entities,
            fetch_timeout,
            sweep_interval,
            area: self.area,
            decay: self.decay.clone(),
            source,
        })
    }
}

/// Validated configuration one feed loop runs with. Read once at loop start.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub feed: FeedKind,
    pub poll_interval: Duration,
    pub ttl: Duration,
    pub max_entities: usize,
    pub fetch_timeout: Duration,
    pub sweep_interval: Duration,
    pub area: Option<AreaFilter>,
    pub decay: DecayRamp,
    pub source: SourceConfig,
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<GeofeedConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    GeofeedConfig::from_toml_str(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Coordinates;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = GeofeedConfig::default();
        assert_eq!(config.publisher.decay_interval_ms, 1000);
        assert!(!config.feeds.ships.enabled);
        assert_eq!(config.feeds.flights.poll_interval_secs, 8);
        assert_eq!(config.feeds.lightning.ttl_secs, 600);
        assert_eq!(config.feeds.lightning.max_entities, 3000);
        assert_eq!(config.feeds.radar.max_entities, 6);
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [publisher]
            decay_interval_ms = 500

            [feeds.ships]
            enabled = true
            poll_interval_secs = 15
            ttl_secs = 90
            max_entities = 50

            [feeds.ships.area]
            kind = "bounding_box"
            min_lon = -1.0
            min_lat = 38.0
            max_lon = 1.5
            max_lat = 41.0

            [feeds.ships.source]
            provider = "geo_json"
            url = "http://relay.local/api/ships"
            id_property = "mmsi"

            [feeds.lightning.area]
            kind = "radius"
            center = { lat = 39.98, lon = -0.03 }
            radius_km = 80.0
        "#;

        let config = GeofeedConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.publisher.decay_interval(), Duration::from_millis(500));

        let ships = &config.feeds.ships;
        assert!(ships.enabled);
        assert_eq!(ships.poll_interval_secs, 15);
        assert_eq!(ships.max_entities, 50);
        assert_eq!(
            ships.source,
            Some(SourceConfig::GeoJson {
                url: "http://relay.local/api/ships".to_string(),
                id_property: Some("mmsi".to_string()),
            })
        );

        // Present section without a source keeps field defaults only
        let lightning = &config.feeds.lightning;
        assert_eq!(lightning.ttl_secs, 120);
        assert!(lightning.source.is_none());
        assert_eq!(
            lightning.area,
            Some(AreaFilter::Radius {
                center: Coordinates::new(39.98, -0.03),
                radius_km: 80.0,
            })
        );
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [publisher]
            decay_interval_ms = 250
        "#;

        let config = GeofeedConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.publisher.decay_interval_ms, 250);
        assert_eq!(config.feeds.flights.ttl_secs, 30); // Default
        assert!(config.feeds.radar.source.is_some()); // Default
    }

    #[test]
    fn test_zero_decay_interval_falls_back_to_default() {
        let config = PublisherConfig {
            decay_interval_ms: 0,
        };
        assert_eq!(config.decay_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_validate_default_feeds() {
        let feeds = FeedsConfig::default();
        for feed in [FeedKind::Flights, FeedKind::Lightning, FeedKind::Radar] {
            let settings = feeds.get(feed).validate(feed).unwrap();
            assert_eq!(settings.feed, feed);
        }
        // Ships ship without a source
        assert_eq!(
            feeds.ships.validate(FeedKind::Ships).unwrap_err(),
            ConfigError::MissingSource {
                feed: FeedKind::Ships
            }
        );
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let config = FeedConfig {
            poll_interval_secs: 0,
            ..FeedConfig::flights()
        };
        assert_eq!(
            config.validate(FeedKind::Flights).unwrap_err(),
            ConfigError::ZeroValue {
                feed: FeedKind::Flights,
                field: "poll_interval_secs"
            }
        );
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = FeedConfig {
            max_entities: 0,
            ..FeedConfig::lightning()
        };
        assert!(matches!(
            config.validate(FeedKind::Lightning),
            Err(ConfigError::ZeroValue {
                field: "max_entities",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_area() {
        let config = FeedConfig {
            area: Some(AreaFilter::BoundingBox(BoundingBox::new(5.0, 38.0, 1.0, 41.0))),
            ..FeedConfig::flights()
        };
        assert!(matches!(
            config.validate(FeedKind::Flights),
            Err(ConfigError::InvalidArea { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_mismatched_source() {
        let config = FeedConfig {
            source: Some(SourceConfig::open_sky()),
            ..FeedConfig::radar()
        };
        assert!(matches!(
            config.validate(FeedKind::Radar),
            Err(ConfigError::UnsupportedSource { .. })
        ));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[feeds.radar]\nenabled = false").unwrap();

        let config = load_config(file.path()).unwrap();
        assert!(!config.feeds.radar.enabled);
        assert_eq!(config.feeds.radar.poll_interval_secs, 10);
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config("/nonexistent/geofeed.toml").is_err());
    }

    #[test]
    fn test_unparseable_interval_is_rejected() {
        let toml = r#"
            [feeds.flights]
            poll_interval_secs = "soon"
        "#;
        assert!(GeofeedConfig::from_toml_str(toml).is_err());
    }
}
