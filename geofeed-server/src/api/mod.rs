// HTTP and WebSocket API for the kiosk front-end

pub mod feeds;
pub mod websocket;

pub use websocket::ws_handler;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use geofeed::{FeedError, FeedManager};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared application state for every route
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<FeedManager>,
}

/// Create the API router with permissive CORS
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/snapshot", get(feeds::get_snapshot))
        .route("/api/health", get(feeds::get_health))
        .route("/api/feeds/:feed", get(feeds::get_feed_geojson))
        .route("/api/feeds/:feed/enable", post(feeds::enable_feed))
        .route("/api/feeds/:feed/disable", post(feeds::disable_feed))
        .route("/api/ws", get(ws_handler))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Application error types
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    InvalidConfig(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InvalidConfig(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl From<FeedError> for ApiError {
    fn from(e: FeedError) -> Self {
        match e {
            FeedError::UnknownFeed(_) => ApiError::NotFound(e.to_string()),
            FeedError::Config(_) => ApiError::InvalidConfig(e.to_string()),
        }
    }
}
