// HTTP and WebSocket API
pub mod api;

// Provider name to feed client mapping
pub mod registry;

// Concrete feed clients
pub mod sources;

pub use registry::SourceFactory;
