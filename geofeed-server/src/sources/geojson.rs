//! Generic GeoJSON relay client.
//!
//! Reads a FeatureCollection of points and maps each feature's properties
//! onto the attributes of the feed it serves. Ships, aircraft and strikes
//! relayed from push-based upstreams all arrive this way.

use super::{get_json, http_client, parse_timestamp};
use async_trait::async_trait;
use geofeed::{Coordinates, EntityAttributes, FeedClient, FeedKind, FeedRecord, FetchError};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub id: Option<Value>,
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub coordinates: Vec<f64>,
}

pub struct GeoJsonClient {
    http: Client,
    url: String,
    id_property: Option<String>,
}

impl GeoJsonClient {
    pub fn new(url: impl Into<String>, id_property: Option<String>) -> reqwest::Result<Self> {
        Ok(Self {
            http: http_client()?,
            url: url.into(),
            id_property,
        })
    }
}

#[async_trait]
impl FeedClient for GeoJsonClient {
    async fn fetch(
        &self,
        feed: FeedKind,
        timeout: Duration,
    ) -> Result<Vec<FeedRecord>, FetchError> {
        let collection: FeatureCollection = get_json(&self.http, &self.url, &[], timeout).await?;
        Ok(parse_collection(feed, collection, self.id_property.as_deref()))
    }
}

/// Property holding the identity when none is configured.
fn default_id_property(feed: FeedKind) -> Option<&'static str> {
    match feed {
        FeedKind::Ships => Some("mmsi"),
        FeedKind::Flights => Some("icao24"),
        FeedKind::Lightning | FeedKind::Radar => None,
    }
}

pub fn parse_collection(
    feed: FeedKind,
    collection: FeatureCollection,
    id_property: Option<&str>,
) -> Vec<FeedRecord> {
    let id_property = id_property.or(default_id_property(feed));
    collection
        .features
        .into_iter()
        .filter_map(|f| parse_feature(feed, f, id_property))
        .collect()
}

/// Non-point features are skipped. Missing ids and positions are left for
/// the feed loop to default or reject.
fn parse_feature(feed: FeedKind, feature: Feature, id_property: Option<&str>) -> Option<FeedRecord> {
    let coordinates = match &feature.geometry {
        Some(g) if g.kind != "Point" => return None,
        Some(g) if g.coordinates.len() >= 2 => {
            Some(Coordinates::new(g.coordinates[1], g.coordinates[0]))
        }
        _ => None,
    };

    let props = &feature.properties;
    let id = id_property
        .and_then(|key| props.get(key))
        .or(feature.id.as_ref())
        .and_then(id_string);

    Some(FeedRecord {
        id,
        coordinates,
        attributes: attributes(feed, props)?,
        observed_at: props.get("ts").and_then(parse_timestamp),
        received_at: None,
    })
}

fn attributes(feed: FeedKind, props: &Map<String, Value>) -> Option<EntityAttributes> {
    let text = |key: &str| props.get(key).and_then(Value::as_str).map(str::to_string);
    let number = |key: &str| props.get(key).and_then(Value::as_f64);

    let attributes = match feed {
        FeedKind::Ships => EntityAttributes::Ship {
            name: text("name"),
            speed_knots: number("sog"),
            course_deg: number("cog"),
            heading_deg: number("heading"),
        },
        FeedKind::Flights => EntityAttributes::Aircraft {
            callsign: text("callsign").map(|c| c.trim().to_string()),
            origin_country: text("country").or_else(|| text("origin_country")),
            altitude_m: number("alt"),
            velocity_ms: number("vel"),
            heading_deg: number("head"),
            on_ground: props
                .get("on_ground")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        },
        FeedKind::Lightning => EntityAttributes::Strike {
            amplitude: number("amplitude"),
            station_count: props
                .get("station_count")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok()),
        },
        FeedKind::Radar => return None,
    };
    Some(attributes)
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
