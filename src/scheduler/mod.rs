mod client;
mod feed_loop;
mod manager;
mod ticker;

pub use client::{ClientFactory, FeedClient};
pub use manager::{FeedManager, StartSummary};
