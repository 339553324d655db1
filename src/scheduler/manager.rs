//! Feed manager - orchestrates feed loop lifecycle.
//!
//! Validates each feed's configuration, builds its client, and starts one
//! independent loop per enabled feed plus the decay ticker shared by all.

use super::client::{ClientFactory, FeedClient};
use super::feed_loop::FeedLoop;
use super::ticker::spawn_decay_ticker;
use crate::config::{FeedConfig, FeedSettings, FeedsConfig, GeofeedConfig};
use crate::error::{ConfigError, FeedError};
use crate::feed::FeedKind;
use crate::health::{FeedHealth, HealthRegistry};
use crate::snapshot::{Snapshot, SnapshotPublisher};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Result of [`FeedManager::start`].
#[derive(Debug, Default)]
pub struct StartSummary {
    pub started: Vec<FeedKind>,
    pub disabled: Vec<FeedKind>,
    /// Feeds whose configuration kept them from starting
    pub failed: Vec<(FeedKind, ConfigError)>,
}

impl StartSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Feed manager - owns every feed loop and the snapshot publisher.
///
/// # Responsibilities
/// - Start a loop for each enabled feed
/// - Enable, disable and reconfigure feeds at runtime
/// - Run the decay ticker
/// - Expose snapshots and per-feed health to readers
/// - Graceful shutdown
pub struct FeedManager {
    feeds: parking_lot::Mutex<FeedsConfig>,
    decay_interval: Duration,
    factory: Arc<dyn ClientFactory>,
    publisher: Arc<SnapshotPublisher>,
    health: Arc<HealthRegistry>,
    /// Per-feed loop handles; held across awaits so enable/disable serialize
    loops: tokio::sync::Mutex<HashMap<FeedKind, JoinHandle<()>>>,
    ticker: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl FeedManager {
    pub fn new(config: GeofeedConfig, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            feeds: parking_lot::Mutex::new(config.feeds),
            decay_interval: config.publisher.decay_interval(),
            factory,
            publisher: Arc::new(SnapshotPublisher::new()),
            health: Arc::new(HealthRegistry::new()),
            loops: tokio::sync::Mutex::new(HashMap::new()),
            ticker: parking_lot::Mutex::new(None),
        }
    }

    /// Starts the decay ticker and a loop for every enabled feed.
    ///
    /// A feed with bad configuration is reported in the summary and left
    /// disabled; the others start regardless.
    pub async fn start(&self) -> StartSummary {
        info!("Starting feed manager");

        {
            let mut ticker = self.ticker.lock();
            if let Some(old) = ticker.take() {
                old.abort();
            }
            *ticker = Some(spawn_decay_ticker(
                Arc::clone(&self.publisher),
                self.decay_interval,
            ));
        }

        let mut summary = StartSummary::default();
        for feed in FeedKind::ALL {
            if !self.feeds.lock().get(feed).enabled {
                summary.disabled.push(feed);
                continue;
            }

            match self.enable_feed(feed).await {
                Ok(()) => summary.started.push(feed),
                Err(FeedError::Config(e)) => summary.failed.push((feed, e)),
                Err(e) => warn!(feed = %feed, error = %e, "Unexpected error starting feed"),
            }
        }

        info!(
            started = summary.started.len(),
            disabled = summary.disabled.len(),
            failed = summary.failed.len(),
            "Feed manager started"
        );

        summary
    }

    /// Starts a fresh loop for `feed` with an immediate first fetch.
    ///
    /// No-op if the feed is already running. The feed is only marked enabled
    /// once its loop has started.
    pub async fn enable_feed(&self, feed: FeedKind) -> Result<(), FeedError> {
        let mut loops = self.loops.lock().await;
        if loops.contains_key(&feed) {
            return Ok(());
        }

        let config = self.feeds.lock().get(feed).clone();
        let (settings, client) = self
            .build_client(feed, &config)
            .map_err(|e| self.config_failed(feed, e))?;

        loops.insert(feed, self.start_loop(settings, client));
        self.feeds.lock().get_mut(feed).enabled = true;
        Ok(())
    }

    /// Stops `feed`'s loop and clears its layer.
    ///
    /// Returns false if the feed was not running. Once this returns, the
    /// feed's entities are gone from every snapshot published afterwards.
    pub async fn disable_feed(&self, feed: FeedKind) -> bool {
        let mut loops = self.loops.lock().await;
        self.feeds.lock().get_mut(feed).enabled = false;

        let was_running = self.stop_loop(&mut loops, feed).await;
        if was_running {
            info!(feed = %feed, "Feed disabled");
        }
        was_running
    }

    /// Replaces `feed`'s configuration and restarts it if enabled.
    ///
    /// The new client is built before the running loop is stopped, so an
    /// invalid configuration or a failing client build leaves the current
    /// loop untouched.
    pub async fn reconfigure(&self, feed: FeedKind, config: FeedConfig) -> Result<(), FeedError> {
        let prepared = if config.enabled {
            match self.build_client(feed, &config) {
                Ok(prepared) => Some(prepared),
                Err(e) => {
                    warn!(feed = %feed, error = %e, "Rejected feed reconfiguration");
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        let mut loops = self.loops.lock().await;
        self.stop_loop(&mut loops, feed).await;

        let enabled = prepared.is_some();
        *self.feeds.lock().get_mut(feed) = config;
        if let Some((settings, client)) = prepared {
            loops.insert(feed, self.start_loop(settings, client));
        }

        info!(feed = %feed, enabled = enabled, "Feed reconfigured");
        Ok(())
    }

    pub async fn is_running(&self, feed: FeedKind) -> bool {
        self.loops.lock().await.contains_key(&feed)
    }

    pub fn feed_config(&self, feed: FeedKind) -> FeedConfig {
        self.feeds.lock().get(feed).clone()
    }

    pub fn health(&self, feed: FeedKind) -> FeedHealth {
        self.health.get(feed)
    }

    pub fn health_all(&self) -> Vec<FeedHealth> {
        self.health.all()
    }

    pub fn latest_snapshot(&self) -> Arc<Snapshot> {
        self.publisher.latest()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.publisher.subscribe()
    }

    pub fn publisher(&self) -> Arc<SnapshotPublisher> {
        Arc::clone(&self.publisher)
    }

    /// Shuts down all feed loops and the decay ticker.
    pub async fn shutdown(&self) {
        info!("Shutting down feed manager");

        if let Some(ticker) = self.ticker.lock().take() {
            ticker.abort();
        }

        let mut loops = self.loops.lock().await;
        let count = loops.len();
        for (feed, handle) in loops.drain() {
            handle.abort();
            let _ = handle.await;
            self.publisher.remove_layer(feed);
            self.health.handle(feed).lock().mark_disabled();
        }

        info!(feed_count = count, "All feed loops stopped");
    }

    fn build_client(
        &self,
        feed: FeedKind,
        config: &FeedConfig,
    ) -> Result<(FeedSettings, Arc<dyn FeedClient>), ConfigError> {
        let settings = config.validate(feed)?;
        let client = self.factory.build(&settings)?;
        Ok((settings, client))
    }

    fn config_failed(&self, feed: FeedKind, e: ConfigError) -> FeedError {
        error!(feed = %feed, error = %e, "Feed configuration error, not starting");
        self.health.handle(feed).lock().record_config_error(&e);
        e.into()
    }

    fn start_loop(&self, settings: FeedSettings, client: Arc<dyn FeedClient>) -> JoinHandle<()> {
        let health = self.health.handle(settings.feed);
        health.lock().mark_starting();
        FeedLoop::new(settings, client, Arc::clone(&self.publisher), health).start()
    }

    /// Abort and await the loop, then drop its layer and mark it disabled.
    async fn stop_loop(&self, loops: &mut HashMap<FeedKind, JoinHandle<()>>, feed: FeedKind) -> bool {
        let was_running = match loops.remove(&feed) {
            Some(handle) => {
                handle.abort();
                // Wait for the loop to drop so it cannot publish again
                let _ = handle.await;
                true
            }
            None => false,
        };

        self.publisher.remove_layer(feed);
        self.health.handle(feed).lock().mark_disabled();
        was_running
    }
}

impl Drop for FeedManager {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.get_mut().take() {
            ticker.abort();
        }
        for (_, handle) in self.loops.get_mut().drain() {
            handle.abort();
        }
    }
}
