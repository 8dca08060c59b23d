use serde::{Deserialize, Serialize};

use super::line::Line;

/// # Bus Info
///
/// Detail record for one vehicle (`GET /api/buses/{id}/info`): its current
/// assignment and, when the assignment belongs to a line, that line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusInfo {
    pub id: String,
    #[serde(default)]
    pub assignment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<Line>,
}

impl BusInfo {
    /// A detail without an id carries nothing a popup could show.
    pub fn is_empty(&self) -> bool {
        self.id.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_bus_info_without_line() {
        let info: BusInfo =
            serde_json::from_str(r#"{"id":"bus1","assignment":"Depot run"}"#).unwrap();
        assert_eq!(info.line, None);
        assert!(!info.is_empty());
    }

    #[test]
    fn test_decode_bus_info_with_line() {
        let info: BusInfo = serde_json::from_str(
            r##"{"id":"bus2","assignment":"Tour 4","line":{"id":"L10","name":"10","color":"#0a0"}}"##,
        )
        .unwrap();
        assert_eq!(info.line.unwrap().color, "#0a0");
    }

    #[test]
    fn test_blank_id_is_empty() {
        let info = BusInfo {
            id: "  ".into(),
            assignment: String::new(),
            line: None,
        };
        assert!(info.is_empty());
    }
}
