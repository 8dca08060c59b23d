//! # Domain Model
//!
//! Wire and domain types shared by the feed, the catalog client and the stores.
//! Field names follow the JSON produced by the traffic server (`loc`, `stopId`,
//! `departure`, ...).

/// Vehicle locations as pushed by the feed, plus the derived marker state.
pub mod vehicle;
/// Transit lines and their drawable routes.
pub mod line;
/// Detail record returned by the bus info endpoint.
pub mod bus;

pub use bus::BusInfo;
pub use line::{Line, LineRoute};
pub use vehicle::{MarkerMap, Position, VehicleLocation, VehicleMarker, VehicleStatus};
