//! OpenSky Network state vectors.

use super::{get_json, http_client};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use geofeed::feed::{AreaFilter, BoundingBox};
use geofeed::{Coordinates, EntityAttributes, FeedClient, FeedKind, FeedRecord, FetchError};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const KM_PER_DEGREE: f64 = 111.32;

/// Response of `GET /states/all`.
#[derive(Debug, Deserialize)]
pub struct StatesResponse {
    pub time: Option<i64>,
    /// Positional arrays; see [`parse_state`] for the index layout
    pub states: Option<Vec<Vec<Value>>>,
}

/// Polls `/states/all` for aircraft inside the feed's area.
pub struct OpenSkyClient {
    http: Client,
    base_url: String,
    bounds: Option<BoundingBox>,
}

impl OpenSkyClient {
    pub fn new(base_url: impl Into<String>, area: Option<&AreaFilter>) -> reqwest::Result<Self> {
        Ok(Self {
            http: http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bounds: area.map(query_bounds),
        })
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        match &self.bounds {
            Some(b) => vec![
                ("lamin", b.min_lat.to_string()),
                ("lomin", b.min_lon.to_string()),
                ("lamax", b.max_lat.to_string()),
                ("lomax", b.max_lon.to_string()),
            ],
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl FeedClient for OpenSkyClient {
    async fn fetch(
        &self,
        _feed: FeedKind,
        timeout: Duration,
    ) -> Result<Vec<FeedRecord>, FetchError> {
        let url = format!("{}/states/all", self.base_url);
        let response: StatesResponse = get_json(&self.http, &url, &self.query(), timeout).await?;
        Ok(parse_states(response))
    }
}

/// Box sent upstream; radius filters are widened to their enclosing box and
/// trimmed precisely by the feed loop.
fn query_bounds(area: &AreaFilter) -> BoundingBox {
    match area {
        AreaFilter::BoundingBox(bbox) => *bbox,
        AreaFilter::Radius { center, radius_km } => {
            let d_lat = radius_km / KM_PER_DEGREE;
            let d_lon = radius_km / (KM_PER_DEGREE * center.lat.to_radians().cos().max(0.01));
            BoundingBox::new(
                (center.lon - d_lon).max(-180.0),
                (center.lat - d_lat).max(-90.0),
                (center.lon + d_lon).min(180.0),
                (center.lat + d_lat).min(90.0),
            )
        }
    }
}

pub fn parse_states(response: StatesResponse) -> Vec<FeedRecord> {
    response
        .states
        .unwrap_or_default()
        .iter()
        .filter_map(|state| parse_state(state))
        .collect()
}

/// One state vector:
/// `[icao24, callsign, origin_country, time_position, last_contact,
///   longitude, latitude, baro_altitude, on_ground, velocity, true_track,
///   vertical_rate, sensors, geo_altitude, squawk, spi, position_source]`
///
/// Vectors without a position are skipped.
fn parse_state(state: &[Value]) -> Option<FeedRecord> {
    if state.len() < 17 {
        return None;
    }

    let icao24 = state[0].as_str()?.trim();
    let lon = state[5].as_f64()?;
    let lat = state[6].as_f64()?;

    let callsign = state[1]
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let observed_at = state[3]
        .as_i64()
        .or_else(|| state[4].as_i64())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

    let mut record = FeedRecord::new(EntityAttributes::Aircraft {
        callsign,
        origin_country: state[2].as_str().map(str::to_string),
        altitude_m: state[7].as_f64().or_else(|| state[13].as_f64()),
        velocity_ms: state[9].as_f64(),
        heading_deg: state[10].as_f64(),
        on_ground: state[8].as_bool().unwrap_or(false),
    })
    .with_id(icao24)
    .at(Coordinates::new(lat, lon));
    record.observed_at = observed_at;

    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn state_vector(icao24: &str, lon: Value, lat: Value) -> Vec<Value> {
        vec![
            json!(icao24),
            json!("IBE3018 "),
            json!("Spain"),
            json!(1_700_000_000),
            json!(1_700_000_005),
            lon,
            lat,
            json!(9000.0),
            json!(false),
            json!(250.0),
            json!(90.0),
            json!(0.0),
            json!(null),
            json!(9100.0),
            json!("1000"),
            json!(false),
            json!(0),
        ]
    }

    #[test]
    fn test_parse_state_vector() {
        let records = parse_states(StatesResponse {
            time: Some(1_700_000_010),
            states: Some(vec![state_vector("345f01", json!(-0.2), json!(40.0))]),
        });

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id.as_deref(), Some("345f01"));
        assert_eq!(record.coordinates, Some(Coordinates::new(40.0, -0.2)));
        assert_eq!(record.observed_at.unwrap().timestamp(), 1_700_000_000);
        match &record.attributes {
            EntityAttributes::Aircraft {
                callsign,
                origin_country,
                altitude_m,
                ..
            } => {
                assert_eq!(callsign.as_deref(), Some("IBE3018"));
                assert_eq!(origin_country.as_deref(), Some("Spain"));
                assert_eq!(*altitude_m, Some(9000.0));
            }
            other => panic!("unexpected attributes {:?}", other),
        }
    }

    #[test]
    fn test_parse_skips_positionless_and_short_vectors() {
        let mut geo_only = state_vector("4ca2ae", json!(0.3), json!(39.7));
        geo_only[7] = json!(null);
        geo_only[3] = json!(null);

        let records = parse_states(StatesResponse {
            time: None,
            states: Some(vec![
                state_vector("aaaaaa", json!(null), json!(39.0)),
                vec![json!("bbbbbb")],
                geo_only,
            ]),
        });

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id.as_deref(), Some("4ca2ae"));
        // Falls back to last_contact and geometric altitude
        assert_eq!(records[0].observed_at.unwrap().timestamp(), 1_700_000_005);
        assert!(matches!(
            records[0].attributes,
            EntityAttributes::Aircraft {
                altitude_m: Some(a),
                ..
            } if a == 9100.0
        ));
    }

    #[test]
    fn test_null_states_is_empty_batch() {
        let response: StatesResponse =
            serde_json::from_str(r#"{"time": 1700000000, "states": null}"#).unwrap();
        assert!(parse_states(response).is_empty());
    }

    #[test]
    fn test_radius_area_widens_to_enclosing_box() {
        let bounds = query_bounds(&AreaFilter::Radius {
            center: Coordinates::new(0.0, 0.0),
            radius_km: KM_PER_DEGREE,
        });
        assert!((bounds.max_lat - 1.0).abs() < 1e-9);
        assert!((bounds.min_lon + 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fetch_sends_bounding_box() {
        let mut server = Server::new_async().await;
        let body = json!({
            "time": 1_700_000_010,
            "states": [state_vector("345f01", json!(-0.2), json!(40.0))],
        });
        let mock = server
            .mock("GET", "/states/all")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("lamin".into(), "38".into()),
                Matcher::UrlEncoded("lomin".into(), "-1".into()),
                Matcher::UrlEncoded("lamax".into(), "41".into()),
                Matcher::UrlEncoded("lomax".into(), "1.5".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let area = AreaFilter::BoundingBox(BoundingBox::new(-1.0, 38.0, 1.5, 41.0));
        let client = OpenSkyClient::new(server.url(), Some(&area)).unwrap();
        let records = client
            .fetch(FeedKind::Flights, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_rate_limited() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/states/all")
            .with_status(429)
            .with_body("Too many requests")
            .create_async()
            .await;

        let client = OpenSkyClient::new(server.url(), None).unwrap();
        let result = client.fetch(FeedKind::Flights, Duration::from_secs(5)).await;

        assert!(matches!(result, Err(FetchError::Status { status: 429, .. })));
    }
}
