//! Small geometry types shared by config, overlay and presentation code

use serde::{Deserialize, Serialize};

/// Top-left corner of an overlay in root-window coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn square(edge: u32) -> Self {
        Self::new(edge, edge)
    }
}

/// Usable desktop rectangle (work area minus panels/docks)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// Remembered placement for one image, keyed by bare filename in the config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPlacement {
    pub x: i32,
    pub y: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl SavedPlacement {
    pub fn at(position: Position) -> Self {
        Self {
            x: position.x,
            y: position.y,
            width: None,
            height: None,
        }
    }

    pub fn with_size(position: Position, size: Dimensions) -> Self {
        Self {
            x: position.x,
            y: position.y,
            width: Some(size.width),
            height: Some(size.height),
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    /// Saved size, only when both edges were recorded
    pub fn dimensions(&self) -> Option<Dimensions> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(Dimensions::new(w, h)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saved_placement_without_size_omits_fields() {
        let json = serde_json::to_string(&SavedPlacement::at(Position::new(10, 20))).unwrap();
        assert_eq!(json, r#"{"x":10,"y":20}"#);
    }

    #[test]
    fn test_saved_placement_partial_size_is_ignored() {
        let placement: SavedPlacement = serde_json::from_str(r#"{"x":1,"y":2,"width":300}"#).unwrap();
        assert_eq!(placement.position(), Position::new(1, 2));
        assert_eq!(placement.dimensions(), None);
    }

    #[test]
    fn test_saved_placement_with_size() {
        let placement = SavedPlacement::with_size(Position::new(5, 6), Dimensions::new(120, 90));
        assert_eq!(placement.dimensions(), Some(Dimensions::new(120, 90)));
    }
}
