use crate::feed::FeedKind;
use std::time::Duration;
use thiserror::Error;

/// Failure returned by a feed client for one fetch.
///
/// Always recovered locally: the feed loop records it and retries on its
/// next natural tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse feed payload: {0}")]
    Parse(String),

    #[error("feed client unavailable: {0}")]
    Unavailable(String),
}

/// A single malformed entity inside an otherwise successful batch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("entity has no id")]
    MissingId,

    #[error("entity '{id}' has no coordinates")]
    MissingCoordinates { id: String },

    #[error("entity '{id}' has no observation time")]
    MissingObservedAt { id: String },

    #[error("entity '{id}' has out-of-range coordinates ({lat}, {lon})")]
    CoordinatesOutOfRange { id: String, lat: f64, lon: f64 },
}

/// Configuration problem discovered when a feed loop is about to start.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{feed}: {field} must be greater than zero")]
    ZeroValue { feed: FeedKind, field: &'static str },

    #[error("{feed}: invalid area filter: {reason}")]
    InvalidArea { feed: FeedKind, reason: String },

    #[error("{feed}: invalid decay ramp: {reason}")]
    InvalidDecayRamp { feed: FeedKind, reason: String },

    #[error("{feed}: no source configured")]
    MissingSource { feed: FeedKind },

    #[error("{feed}: source '{provider}' cannot serve this feed")]
    UnsupportedSource { feed: FeedKind, provider: String },

    #[error("{feed}: failed to build feed client: {reason}")]
    Client { feed: FeedKind, reason: String },
}

/// Errors surfaced by the feed manager's control operations.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown feed '{0}'")]
    UnknownFeed(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
