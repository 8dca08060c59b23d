//! # lib_livemap
//!
//! State synchronization layer for the live transit map. It turns the
//! server-pushed vehicle location feed and the line / bus catalog endpoints
//! into a handful of read-only reactive views that a renderer can draw.
//!
//! ## Layout
//! - **`model`**: wire and domain types (vehicle locations, lines, routes, bus info).
//! - **`ingestors`**: the shared, self-healing location feed connection.
//! - **`retrieve`**: the HTTP client and the line / bus catalog built on top of it.
//! - **`core`**: the fan-out dispatcher, the line selection bus and the stores.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod core;
pub mod ingestors;
pub mod model;
pub mod retrieve;

// Re-export the renderer-facing surface.
pub use crate::core::map_view::MapView;
pub use crate::core::vehicle_tracker::TrackerConfig;
pub use crate::core::visible_lines::RouteMap;
pub use crate::core::store_view::StoreView;
pub use crate::ingestors::location_feed::{ConnectionManager, ConnectionState, FeedConfig, FeedError};
pub use crate::model::{
    BusInfo, Line, LineRoute, MarkerMap, Position, VehicleLocation, VehicleMarker, VehicleStatus,
};
pub use crate::retrieve::catalog::{BusDirectory, CatalogConfig, CatalogError, HttpCatalog, LineCatalog};
