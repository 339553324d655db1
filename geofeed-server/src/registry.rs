//! Source registry - maps configured providers onto feed clients.

use crate::sources::{AemetRadarClient, GeoJsonClient, OpenSkyClient, StrikeSimulator};
use geofeed::config::SourceConfig;
use geofeed::{ClientFactory, ConfigError, FeedClient, FeedSettings};
use std::sync::Arc;
use std::time::Duration;

/// Builds the concrete client for a feed from its validated settings.
#[derive(Debug, Default, Clone, Copy)]
pub struct SourceFactory;

impl ClientFactory for SourceFactory {
    fn build(&self, settings: &FeedSettings) -> Result<Arc<dyn FeedClient>, ConfigError> {
        let feed = settings.feed;
        let client_error = |e: reqwest::Error| ConfigError::Client {
            feed,
            reason: e.to_string(),
        };

        let client: Arc<dyn FeedClient> = match &settings.source {
            SourceConfig::OpenSky { base_url } => Arc::new(
                OpenSkyClient::new(base_url.as_str(), settings.area.as_ref())
                    .map_err(client_error)?,
            ),
            SourceConfig::GeoJson { url, id_property } => Arc::new(
                GeoJsonClient::new(url.as_str(), id_property.clone()).map_err(client_error)?,
            ),
            SourceConfig::AemetRadar {
                url_template,
                frame_count,
                frame_step_minutes,
                center,
            } => Arc::new(AemetRadarClient::new(
                url_template.as_str(),
                *frame_count,
                *frame_step_minutes,
                *center,
            )),
            SourceConfig::StrikeSimulator {
                center,
                spread_deg,
                retention_secs,
            } => Arc::new(StrikeSimulator::new(
                *center,
                *spread_deg,
                Duration::from_secs(*retention_secs),
            )),
        };

        Ok(client)
    }
}
