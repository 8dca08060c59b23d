use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// A WGS84 coordinate. On the wire it is a two element array `[lat, lon]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

impl Position {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<[f64; 2]> for Position {
    fn from([lat, lon]: [f64; 2]) -> Self {
        Self { lat, lon }
    }
}

impl From<Position> for [f64; 2] {
    fn from(position: Position) -> Self {
        [position.lat, position.lon]
    }
}

/// # Vehicle Location
///
/// One update from the location feed. The latest message for a given `id`
/// supersedes every earlier one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleLocation {
    /// Identity of the vehicle (e.g. `"bus1"`).
    pub id: String,
    /// Current position, sent as `loc: [lat, lon]`.
    #[serde(rename = "loc")]
    pub position: Position,
    /// Present while the vehicle is halted at a stop.
    #[serde(rename = "stopId", default, skip_serializing_if = "Option::is_none")]
    pub stop_id: Option<String>,
    /// Scheduled departure from the current stop, in milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure: Option<i64>,
}

impl VehicleLocation {
    /// A vehicle reporting a stop is waiting, everything else is driving.
    pub fn status(&self) -> VehicleStatus {
        if self.stop_id.is_some() {
            VehicleStatus::Waiting
        } else {
            VehicleStatus::Driving
        }
    }

    /// The scheduled departure as a UTC timestamp, if one was sent and is in range.
    pub fn departure_time(&self) -> Option<DateTime<Utc>> {
        self.departure.and_then(DateTime::<Utc>::from_timestamp_millis)
    }
}

/// Visual status of a marker, derived from the presence of a stop id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleStatus {
    Driving,
    Waiting,
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehicleStatus::Driving => f.write_str("driving"),
            VehicleStatus::Waiting => f.write_str("waiting"),
        }
    }
}

/// # Vehicle Marker
///
/// Renderer-facing state for one vehicle: the last location received for it,
/// the status derived from that location, and when it was last updated.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleMarker {
    pub location: VehicleLocation,
    pub status: VehicleStatus,
    pub last_seen: Instant,
}

impl VehicleMarker {
    pub fn new(location: VehicleLocation, now: Instant) -> Self {
        let status = location.status();
        Self {
            location,
            status,
            last_seen: now,
        }
    }

    /// Overwrites the marker with a newer location for the same vehicle.
    pub fn update(&mut self, location: VehicleLocation, now: Instant) {
        self.status = location.status();
        self.location = location;
        self.last_seen = now;
    }

    pub fn position(&self) -> Position {
        self.location.position
    }
}

/// vehicle id -> marker
pub type MarkerMap = HashMap<String, VehicleMarker>;
