//! Immutable merged view of every enabled feed, as handed to the renderer.

mod publisher;

pub use publisher::{LayerContents, SnapshotPublisher};

use crate::decay::Weight;
use crate::feed::{Entity, EntityAttributes, FeedKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;


/// One visible entity with the weight it is painted with.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RenderedEntity {
    #[serde(flatten)]
    pub entity: Entity,
    #[serde(flatten)]
    pub weight: Weight,
    /// Seconds since receipt; drives the decay weight
    pub age_secs: f64,
}

/// One feed's portion of a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeedLayer {
    pub feed: FeedKind,
    pub ttl_secs: u64,
    /// Ordered by entity id
    pub entities: Vec<RenderedEntity>,
}

/// Point-in-time copy of every layer. Never mutated after publication.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    /// Incremented on every publication
    pub sequence: u64,
    pub generated_at: DateTime<Utc>,
    pub layers: BTreeMap<FeedKind, FeedLayer>,
}

impl Snapshot {
    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        Self {
            sequence: 0,
            generated_at,
            layers: BTreeMap::new(),
        }
    }

    pub fn layer(&self, feed: FeedKind) -> Option<&FeedLayer> {
        self.layers.get(&feed)
    }

    pub fn entity_count(&self) -> usize {
        self.layers.values().map(|l| l.entities.len()).sum()
    }

    /// Export one layer as a GeoJSON FeatureCollection.
    ///
    /// A feed without a layer exports an empty collection.
    pub fn to_geojson(&self, feed: FeedKind) -> Value {
        let features: Vec<Value> = self
            .layer(feed)
            .map(|layer| layer.entities.iter().map(feature).collect())
            .unwrap_or_default();

        json!({
            "type": "FeatureCollection",
            "features": features,
        })
    }
}

fn feature(rendered: &RenderedEntity) -> Value {
    let entity = &rendered.entity;
    let mut properties = attribute_properties(entity);
    properties.insert("id".into(), json!(entity.id));
    properties.insert("color".into(), json!(rendered.weight.color.to_hex()));
    properties.insert("opacity".into(), json!(rendered.weight.opacity));
    properties.insert("age_secs".into(), json!(rendered.age_secs));

    json!({
        "type": "Feature",
        "geometry": {
            "type": "Point",
            "coordinates": [entity.coordinates.lon, entity.coordinates.lat],
        },
        "properties": properties,
    })
}

/// Property names the kiosk front-end reads for each kind of entity.
fn attribute_properties(entity: &Entity) -> Map<String, Value> {
    let observed_secs = entity.observed_at.timestamp_millis() as f64 / 1000.0;
    let mut props = Map::new();

    match &entity.attributes {
        EntityAttributes::Ship {
            name,
            speed_knots,
            course_deg,
            heading_deg,
        } => {
            props.insert("mmsi".into(), json!(entity.id));
            props.insert("name".into(), json!(name.as_deref().unwrap_or("Unknown")));
            props.insert("sog".into(), json!(speed_knots.unwrap_or(0.0)));
            props.insert("cog".into(), json!(course_deg.unwrap_or(0.0)));
            props.insert("heading".into(), json!(heading_deg.unwrap_or(0.0)));
            props.insert("ts".into(), json!(observed_secs));
        }
        EntityAttributes::Aircraft {
            callsign,
            origin_country,
            altitude_m,
            velocity_ms,
            heading_deg,
            on_ground,
        } => {
            props.insert("icao24".into(), json!(entity.id));
            props.insert("callsign".into(), json!(callsign.as_deref().unwrap_or("")));
            props.insert("country".into(), json!(origin_country));
            props.insert("alt".into(), json!(altitude_m.unwrap_or(0.0)));
            props.insert("vel".into(), json!(velocity_ms.unwrap_or(0.0)));
            props.insert("head".into(), json!(heading_deg.unwrap_or(0.0)));
            props.insert("on_ground".into(), json!(on_ground));
            props.insert("ts".into(), json!(observed_secs));
        }
        EntityAttributes::Strike {
            amplitude,
            station_count,
        } => {
            // Strike timestamps are milliseconds
            props.insert("ts".into(), json!(entity.observed_at.timestamp_millis()));
            props.insert("amplitude".into(), json!(amplitude.unwrap_or(0.0)));
            props.insert("station_count".into(), json!(station_count.unwrap_or(0)));
        }
        EntityAttributes::RadarFrame { url } => {
            props.insert("url".into(), json!(url));
            props.insert("ts".into(), json!(observed_secs));
        }
    }

    props
}
