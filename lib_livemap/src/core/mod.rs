//! # Core Engine Module
//!
//! The reactive half of the map: fan-out, the line selection bus and the
//! stores that turn feed messages and user actions into read-only views.
//!
//! ## Core Components:
//!
//! - **`dispatcher`**: zero-copy, unbounded fan-out of one item to every live
//!   subscriber. Used for the location feed and the line selection bus.
//! - **`store_view`**: the read-only reactive handle every store hands out.
//! - **`line_bus`**: typed pub/sub between the line list and the visible lines.
//! - **`vehicle_tracker`**: upserts feed messages into one marker per vehicle.
//! - **`visible_lines`**: the map of routes currently drawn.
//! - **`selection`**: last-selection-wins detail lookup for the selected vehicle.
//! - **`line_list`**: the line catalog and which lines the user asked to see.
//! - **`map_view`**: the facade a renderer talks to.

/// Unbounded zero-copy fan-out.
pub mod dispatcher;
/// Read-only reactive views.
pub mod store_view;
/// Line selection pub/sub.
pub mod line_bus;
/// Vehicle marker reconciliation.
pub mod vehicle_tracker;
/// Routes currently on the map.
pub mod visible_lines;
/// Selected-vehicle detail enrichment.
pub mod selection;
/// Line catalog list and per-line visibility requests.
pub mod line_list;
/// Renderer-facing facade.
pub mod map_view;

#[cfg(test)]
pub(crate) mod test_support;

// --- Public API Re-exports ---
pub use dispatcher::{Dispatcher, Subscription};
pub use line_bus::{LineSelectionBus, LineViewEvent};
pub use line_list::LineListStore;
pub use map_view::MapView;
pub use selection::SelectionStore;
pub use store_view::StoreView;
pub use vehicle_tracker::{TrackerConfig, VehicleTracker};
pub use visible_lines::{RouteMap, VisibleLinesStore};
