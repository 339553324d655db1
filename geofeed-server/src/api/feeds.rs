//! Snapshot, health and feed control endpoints.

use super::{ApiError, AppState};
use axum::{
    extract::{Path, State},
    response::Json,
};
use geofeed::{FeedHealth, FeedKind, Snapshot};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Response for GET /api/health
#[derive(Serialize)]
pub struct HealthResponse {
    pub feeds: Vec<FeedHealth>,
}

/// Response for POST /api/feeds/:feed/enable|disable
#[derive(Serialize, Debug, PartialEq)]
pub struct FeedControlResponse {
    pub feed: FeedKind,
    pub running: bool,
    /// False when the call found the feed already in the requested state
    pub changed: bool,
}

fn parse_feed(name: &str) -> Result<FeedKind, ApiError> {
    name.parse::<FeedKind>().map_err(ApiError::from)
}

/// GET /api/snapshot - latest merged snapshot of every layer
pub async fn get_snapshot(State(state): State<Arc<AppState>>) -> Json<Arc<Snapshot>> {
    Json(state.manager.latest_snapshot())
}

/// GET /api/feeds/:feed - one layer as a GeoJSON FeatureCollection
pub async fn get_feed_geojson(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let feed = parse_feed(&name)?;
    Ok(Json(state.manager.latest_snapshot().to_geojson(feed)))
}

/// GET /api/health - per-feed health records
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        feeds: state.manager.health_all(),
    })
}

/// POST /api/feeds/:feed/enable
pub async fn enable_feed(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<FeedControlResponse>, ApiError> {
    let feed = parse_feed(&name)?;
    let was_running = state.manager.is_running(feed).await;

    state.manager.enable_feed(feed).await?;
    info!(feed = %feed, "Feed enabled via API");

    Ok(Json(FeedControlResponse {
        feed,
        running: true,
        changed: !was_running,
    }))
}

/// POST /api/feeds/:feed/disable
pub async fn disable_feed(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<FeedControlResponse>, ApiError> {
    let feed = parse_feed(&name)?;
    let changed = state.manager.disable_feed(feed).await;
    info!(feed = %feed, "Feed disabled via API");

    Ok(Json(FeedControlResponse {
        feed,
        running: false,
        changed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feed_is_case_insensitive() {
        assert_eq!(parse_feed("Flights").unwrap(), FeedKind::Flights);
        assert!(matches!(parse_feed("trains"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_control_response_serialization() {
        let response = FeedControlResponse {
            feed: FeedKind::Radar,
            running: false,
            changed: true,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"feed":"radar","running":false,"changed":true}"#);
    }
}
