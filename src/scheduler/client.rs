use crate::config::FeedSettings;
use crate::error::{ConfigError, FetchError};
use crate::feed::{FeedKind, FeedRecord};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Upstream source for one feed.
///
/// Implementations fetch and parse one batch per call and never retry
/// internally; the feed loop simply tries again on its next tick.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Fetch the current batch for `feed`.
    ///
    /// `timeout` is the per-fetch deadline. The loop also enforces it, so a
    /// client that overruns is reported as [`FetchError::Timeout`].
    async fn fetch(&self, feed: FeedKind, timeout: Duration)
        -> Result<Vec<FeedRecord>, FetchError>;
}

/// Builds the client a feed loop will poll.
///
/// Called once per loop start with the validated settings; an error here is
/// a configuration error and keeps that feed from starting.
pub trait ClientFactory: Send + Sync {
    fn build(&self, settings: &FeedSettings) -> Result<Arc<dyn FeedClient>, ConfigError>;
}

impl<F> ClientFactory for F
where
    F: Fn(&FeedSettings) -> Result<Arc<dyn FeedClient>, ConfigError> + Send + Sync,
{
    fn build(&self, settings: &FeedSettings) -> Result<Arc<dyn FeedClient>, ConfigError> {
        self(settings)
    }
}
