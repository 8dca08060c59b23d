use serde::{Deserialize, Serialize};

use super::vehicle::Position;

/// A transit line as listed by the catalog (`GET /api/lines`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Line {
    pub id: String,
    /// Display name, sent as `name`.
    pub name: String,
    /// CSS color string used for the line's path and marker badge.
    pub color: String,
}

/// # Line Route
///
/// A drawable route: the ordered polyline of a line joined with the line's
/// color. Built client-side from `GET /api/lines/{id}/route` and
/// `GET /api/lines/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRoute {
    pub line_id: String,
    pub polyline: Vec<Position>,
    pub color: String,
}

impl LineRoute {
    /// Joins route geometry with the line record it belongs to.
    pub fn join(line: &Line, polyline: Vec<Position>) -> Self {
        Self {
            line_id: line.id.clone(),
            polyline,
            color: line.color.clone(),
        }
    }
}
