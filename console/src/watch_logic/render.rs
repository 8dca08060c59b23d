//! Text rendering of the map views. Every function is pure and returns the
//! text to print, so the screen layout can be tested without a terminal.

use colored::Colorize;
use std::fmt::Write;

use lib_livemap::{BusInfo, ConnectionState, MarkerMap, RouteMap, VehicleStatus};

pub fn render_connection(state: ConnectionState, retries: u64) -> String {
    let label = match state {
        ConnectionState::Idle => "idle".dimmed(),
        ConnectionState::Connecting => "connecting".yellow(),
        ConnectionState::Connected => "connected".green(),
        ConnectionState::Retrying => "retrying".red(),
    };
    format!("Feed: {} (retries: {})", label, retries)
}

pub fn render_markers(markers: &MarkerMap) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<12} {:<8} {:>10} {:>10}  {:<10} {}",
        "VEHICLE", "STATUS", "LAT", "LON", "STOP", "DEPARTURE"
    );

    let mut ids: Vec<&String> = markers.keys().collect();
    ids.sort();

    for id in ids {
        let marker = &markers[id];
        let status = format!("{:<8}", marker.status.to_string());
        let status = match marker.status {
            VehicleStatus::Driving => status.green(),
            VehicleStatus::Waiting => status.yellow(),
        };
        let departure = marker
            .location
            .departure_time()
            .map(|at| at.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let position = marker.position();

        let _ = writeln!(
            out,
            "{:<12} {} {:>10.5} {:>10.5}  {:<10} {}",
            id,
            status,
            position.lat,
            position.lon,
            marker.location.stop_id.as_deref().unwrap_or("-"),
            departure
        );
    }

    let _ = write!(out, "{} vehicle(s)", markers.len());
    out
}

pub fn render_lines(routes: &RouteMap) -> String {
    if routes.is_empty() {
        return "Visible lines: none".to_string();
    }

    let mut ids: Vec<&String> = routes.keys().collect();
    ids.sort();

    let entries: Vec<String> = ids
        .into_iter()
        .map(|id| {
            let route = &routes[id];
            format!("{} [{}, {} points]", id.bold(), route.color, route.polyline.len())
        })
        .collect();
    format!("Visible lines: {}", entries.join(", "))
}

pub fn render_detail(detail: Option<&BusInfo>) -> String {
    match detail {
        None => "Selected bus: -".to_string(),
        Some(info) => {
            let line = info
                .line
                .as_ref()
                .map(|line| format!(" on line {} ({})", line.name, line.id))
                .unwrap_or_default();
            let assignment = if info.assignment.is_empty() {
                "no assignment"
            } else {
                info.assignment.as_str()
            };
            format!("Selected bus: {} - {}{}", info.id.bold(), assignment, line)
        }
    }
}

/// One full screen: connection, markers, lines and the current detail.
pub fn render_screen(
    state: ConnectionState,
    retries: u64,
    markers: &MarkerMap,
    routes: &RouteMap,
    detail: Option<&BusInfo>,
) -> String {
    [
        render_connection(state, retries),
        render_markers(markers),
        render_lines(routes),
        render_detail(detail),
    ]
    .join("\n\n")
}
