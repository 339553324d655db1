// Feed identifiers, entity model and area filters
pub mod feed;

// Typed error taxonomy
pub mod error;

// TOML configuration and validation
pub mod config;

// Per-feed TTL store
pub mod store;

// Age-based visual decay
pub mod decay;

// Merged snapshots and the publisher
pub mod snapshot;

// Per-feed health records
pub mod health;

// Poll scheduling, feed loops and the feed manager
pub mod scheduler;

pub use config::{FeedConfig, FeedSettings, GeofeedConfig};
pub use error::{ConfigError, FeedError, FetchError, ValidationError};
pub use feed::{Coordinates, Entity, EntityAttributes, FeedKind, FeedRecord};
pub use health::{FeedHealth, FeedState};
pub use scheduler::{ClientFactory, FeedClient, FeedManager, StartSummary};
pub use snapshot::{Snapshot, SnapshotPublisher};
