use crate::error::ConfigError;
use crate::feed::{Coordinates, FeedKind};
use serde::{Deserialize, Serialize};

/// Feed-specific connection parameters.
///
/// Interpreted by the client factory when a feed loop starts; the core only
/// checks that the provider can serve the feed it is attached to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum SourceConfig {
    /// OpenSky Network state vectors (aircraft)
    OpenSky {
        #[serde(default = "default_opensky_url")]
        base_url: String,
    },

    /// Any upstream serving a GeoJSON FeatureCollection of points
    GeoJson {
        url: String,
        /// Feature property holding the entity id (e.g. "mmsi")
        #[serde(default)]
        id_property: Option<String>,
    },

    /// Radar frame images published on a fixed time grid
    AemetRadar {
        #[serde(default = "default_radar_url_template")]
        url_template: String,
        #[serde(default = "default_frame_count")]
        frame_count: u32,
        #[serde(default = "default_frame_step_minutes")]
        frame_step_minutes: u32,
        #[serde(default = "default_center")]
        center: Coordinates,
    },

    /// Locally generated lightning strikes around a centre point
    StrikeSimulator {
        #[serde(default = "default_center")]
        center: Coordinates,
        /// Width of the square strikes fall in (degrees)
        #[serde(default = "default_spread_deg")]
        spread_deg: f64,
        #[serde(default = "default_retention_secs")]
        retention_secs: u64,
    },
}

fn default_opensky_url() -> String {
    "https://opensky-network.org/api".to_string()
}

fn default_radar_url_template() -> String {
    "https://www.aemet.es/imagenes_d/eltiempo/observacion/radar/{timestamp}.gif".to_string()
}

fn default_frame_count() -> u32 {
    6
}

fn default_frame_step_minutes() -> u32 {
    10
}

fn default_center() -> Coordinates {
    Coordinates::new(39.986, -0.038)
}

fn default_spread_deg() -> f64 {
    2.0
}

fn default_retention_secs() -> u64 {
    600
}

impl SourceConfig {
    pub fn open_sky() -> Self {
        SourceConfig::OpenSky {
            base_url: default_opensky_url(),
        }
    }

    pub fn aemet_radar() -> Self {
        SourceConfig::AemetRadar {
            url_template: default_radar_url_template(),
            frame_count: default_frame_count(),
            frame_step_minutes: default_frame_step_minutes(),
            center: default_center(),
        }
    }

    pub fn strike_simulator() -> Self {
        SourceConfig::StrikeSimulator {
            center: default_center(),
            spread_deg: default_spread_deg(),
            retention_secs: default_retention_secs(),
        }
    }

    pub fn provider(&self) -> &'static str {
        match self {
            SourceConfig::OpenSky { .. } => "open_sky",
            SourceConfig::GeoJson { .. } => "geo_json",
            SourceConfig::AemetRadar { .. } => "aemet_radar",
            SourceConfig::StrikeSimulator { .. } => "strike_simulator",
        }
    }

    pub fn supports(&self, feed: FeedKind) -> bool {
        match self {
            SourceConfig::OpenSky { .. } => feed == FeedKind::Flights,
            SourceConfig::GeoJson { .. } => feed != FeedKind::Radar,
            SourceConfig::AemetRadar { .. } => feed == FeedKind::Radar,
            SourceConfig::StrikeSimulator { .. } => feed == FeedKind::Lightning,
        }
    }

    pub(crate) fn check(&self, feed: FeedKind) -> Result<(), ConfigError> {
        if !self.supports(feed) {
            return Err(ConfigError::UnsupportedSource {
                feed,
                provider: self.provider().to_string(),
            });
        }

        match self {
            SourceConfig::AemetRadar {
                frame_count,
                frame_step_minutes,
                ..
            } => {
                if *frame_count == 0 {
                    return Err(ConfigError::ZeroValue {
                        feed,
                        field: "source.frame_count",
                    });
                }
                if *frame_step_minutes == 0 {
                    return Err(ConfigError::ZeroValue {
                        feed,
                        field: "source.frame_step_minutes",
                    });
                }
            }
            SourceConfig::StrikeSimulator {
                spread_deg,
                retention_secs,
                ..
            } => {
                if *retention_secs == 0 {
                    return Err(ConfigError::ZeroValue {
                        feed,
                        field: "source.retention_secs",
                    });
                }
                if !(spread_deg.is_finite() && *spread_deg > 0.0) {
                    return Err(ConfigError::ZeroValue {
                        feed,
                        field: "source.spread_deg",
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }
}
