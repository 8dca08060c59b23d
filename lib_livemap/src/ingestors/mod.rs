//! # Data Ingestors Module
//!
//! Clients for the server-pushed data entering the map. There is one source:
//! the vehicle location feed.
//!
//! ## Contained Modules:
//! - **`transport`**: the `FeedTransport` seam and its WebSocket implementation.
//! - **`location_feed`**: the shared, self-healing `ConnectionManager` that
//!   resolves the endpoint, retries forever and multicasts decoded locations.

/// Connection seam between the feed and the network.
pub mod transport;
/// The shared location feed connection.
pub mod location_feed;

// --- Public API Re-exports ---
pub use location_feed::{
    ConnectionManager, ConnectionState, FeedConfig, FeedError, FeedEvent, FeedSubscription,
};
pub use transport::{FeedTransport, TransportError, WsTransport};
