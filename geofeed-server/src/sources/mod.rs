//! Concrete feed clients.
//!
//! Each client fetches one batch per call from its upstream (or generates
//! one locally) and maps it onto typed records. None of them retry; the
//! feed loop polls again on its next tick.

pub mod aemet;
pub mod geojson;
pub mod opensky;
pub mod simulator;

pub use aemet::AemetRadarClient;
pub use geojson::GeoJsonClient;
pub use opensky::OpenSkyClient;
pub use simulator::StrikeSimulator;

use chrono::{DateTime, TimeZone, Utc};
use geofeed::FetchError;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

const USER_AGENT: &str = "geofeed/0.1";

/// Shared HTTP client builder for upstream feeds.
pub(crate) fn http_client() -> reqwest::Result<Client> {
    Client::builder().user_agent(USER_AGENT).build()
}

/// GET `url` and decode the JSON body, mapping every failure onto
/// [`FetchError`].
pub(crate) async fn get_json<T: DeserializeOwned>(
    http: &Client,
    url: &str,
    query: &[(&str, String)],
    timeout: Duration,
) -> Result<T, FetchError> {
    let response = http
        .get(url)
        .query(query)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| request_error(e, timeout))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read body>".to_string());
        return Err(FetchError::Status {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| FetchError::Parse(e.to_string()))
}

fn request_error(e: reqwest::Error, timeout: Duration) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::Network(e.to_string())
    }
}

/// Interpret a feed timestamp.
///
/// Numbers above 1e11 are epoch milliseconds, smaller ones epoch seconds;
/// strings must be RFC 3339.
pub(crate) fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let raw = n.as_f64()?;
            if !raw.is_finite() || raw < 0.0 {
                return None;
            }
            let millis = if raw > 1e11 { raw } else { raw * 1000.0 };
            Utc.timestamp_millis_opt(millis.round() as i64).single()
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}
