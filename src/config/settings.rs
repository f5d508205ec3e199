//! Persisted configuration shape
//!
//! Every field carries an explicit default so a partial or older JSON file
//! still loads; unknown keys are ignored by serde.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;
use tracing::warn;

use crate::constants::timing::MAX_CONFIGURED_SECS;
use crate::types::SavedPlacement;

/// Where a new overlay appears when no saved placement applies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PositionMode {
    #[default]
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Random,
}

impl PositionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionMode::Center => "center",
            PositionMode::TopLeft => "top-left",
            PositionMode::TopRight => "top-right",
            PositionMode::BottomLeft => "bottom-left",
            PositionMode::BottomRight => "bottom-right",
            PositionMode::Random => "random",
        }
    }

    /// Case-insensitive parse; anything unrecognized falls back to center
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "center" => PositionMode::Center,
            "top-left" => PositionMode::TopLeft,
            "top-right" => PositionMode::TopRight,
            "bottom-left" => PositionMode::BottomLeft,
            "bottom-right" => PositionMode::BottomRight,
            "random" => PositionMode::Random,
            other => {
                warn!(position_mode = %other, "Unknown position mode, using center");
                PositionMode::Center
            }
        }
    }
}

impl From<String> for PositionMode {
    fn from(value: String) -> Self {
        Self::parse_lenient(&value)
    }
}

impl From<PositionMode> for String {
    fn from(mode: PositionMode) -> Self {
        mode.as_str().to_string()
    }
}

impl fmt::Display for PositionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application configuration, owned by [`super::ConfigStore`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Absolute paths of the image library (deduplicated)
    pub image_paths: BTreeSet<PathBuf>,

    /// Wait between the end of one display and the next show
    #[serde(rename = "display_interval_secs")]
    pub display_interval: u64,

    /// How long a shown overlay stays before auto-hide
    #[serde(rename = "max_display_secs")]
    pub max_display: u64,

    /// Window opacity, 0.0 to 1.0
    pub opacity: f64,

    pub position_mode: PositionMode,

    /// Target length of the longer overlay edge, in pixels
    pub gif_size: u32,

    /// Saved placements keyed by bare filename (not full path)
    pub custom_positions: HashMap<String, SavedPlacement>,

    /// Remember dragged/resized placements per image
    pub position_persistence: bool,

    pub click_through: bool,
    pub always_on_top: bool,

    /// Start the display cycle as soon as the daemon is up
    pub auto_start: bool,

    /// Where downloaded images go (empty = platform download dir)
    pub download_location: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            image_paths: BTreeSet::new(),
            display_interval: 1800,
            max_display: 10,
            opacity: 0.9,
            position_mode: PositionMode::Center,
            gif_size: 100,
            custom_positions: HashMap::new(),
            position_persistence: true,
            click_through: false,
            always_on_top: false,
            auto_start: false,
            download_location: String::new(),
        }
    }
}

impl Configuration {
    /// Dragging is allowed unless click-through is on and persistence is off
    pub fn drag_allowed(&self) -> bool {
        !(self.click_through && !self.position_persistence)
    }

    /// Overlay windows ignore pointer input in exactly the no-drag case
    pub fn input_transparent(&self) -> bool {
        !self.drag_allowed()
    }

    /// Clamp out-of-range values read from disk.
    /// Returns true if anything changed.
    pub fn validate_and_clamp(&mut self) -> bool {
        let mut changed = false;

        if self.display_interval == 0 {
            warn!("display_interval_secs must be positive, using 1");
            self.display_interval = 1;
            changed = true;
        }
        if self.max_display == 0 {
            warn!("max_display_secs must be positive, using 1");
            self.max_display = 1;
            changed = true;
        }
        if self.display_interval > MAX_CONFIGURED_SECS {
            warn!(
                display_interval_secs = self.display_interval,
                max = MAX_CONFIGURED_SECS,
                "display_interval_secs too large, capping"
            );
            self.display_interval = MAX_CONFIGURED_SECS;
            changed = true;
        }
        if self.max_display > MAX_CONFIGURED_SECS {
            warn!(
                max_display_secs = self.max_display,
                max = MAX_CONFIGURED_SECS,
                "max_display_secs too large, capping"
            );
            self.max_display = MAX_CONFIGURED_SECS;
            changed = true;
        }
        if self.gif_size == 0 {
            warn!("gif_size must be positive, using default");
            self.gif_size = Configuration::default().gif_size;
            changed = true;
        }
        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            let clamped = if self.opacity.is_finite() {
                self.opacity.clamp(0.0, 1.0)
            } else {
                Configuration::default().opacity
            };
            warn!(opacity = self.opacity, clamped, "opacity out of range");
            self.opacity = clamped;
            changed = true;
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_mode_parse_is_case_insensitive() {
        assert_eq!(PositionMode::parse_lenient("Top-Right"), PositionMode::TopRight);
        assert_eq!(PositionMode::parse_lenient("RANDOM"), PositionMode::Random);
    }

    #[test]
    fn test_position_mode_unknown_falls_back_to_center() {
        let config: Configuration = serde_json::from_str(r#"{"position_mode":"middle-ish"}"#).unwrap();
        assert_eq!(config.position_mode, PositionMode::Center);
    }

    #[test]
    fn test_missing_keys_use_defaults_and_unknown_keys_ignored() {
        let config: Configuration =
            serde_json::from_str(r#"{"display_interval_secs":60,"legacy_min_display":3}"#).unwrap();
        assert_eq!(config.display_interval, 60);
        assert_eq!(config.max_display, 10);
        assert_eq!(config.gif_size, 100);
        assert!(config.position_persistence);
    }

    #[test]
    fn test_duplicate_paths_collapse() {
        let config: Configuration =
            serde_json::from_str(r#"{"image_paths":["/a.gif","/b.gif","/a.gif"]}"#).unwrap();
        assert_eq!(config.image_paths.len(), 2);
    }

    #[test]
    fn test_drag_allowed_matrix() {
        let mut config = Configuration::default();
        for (click_through, persistence, allowed) in [
            (false, false, true),
            (false, true, true),
            (true, true, true),
            (true, false, false),
        ] {
            config.click_through = click_through;
            config.position_persistence = persistence;
            assert_eq!(config.drag_allowed(), allowed, "ct={click_through} pp={persistence}");
        }
    }

    #[test]
    fn test_validate_and_clamp() {
        let mut config = Configuration {
            display_interval: 0,
            max_display: 0,
            gif_size: 0,
            opacity: 1.7,
            ..Configuration::default()
        };
        assert!(config.validate_and_clamp());
        assert_eq!(config.display_interval, 1);
        assert_eq!(config.max_display, 1);
        assert_eq!(config.gif_size, 100);
        assert_eq!(config.opacity, 1.0);

        assert!(!config.validate_and_clamp());
    }

    #[test]
    fn test_huge_durations_are_capped() {
        let mut config: Configuration = serde_json::from_str(
            r#"{"display_interval_secs":18446744073709551615,"max_display_secs":18446744073709551615}"#,
        )
        .unwrap();
        assert!(config.validate_and_clamp());
        assert_eq!(config.display_interval, MAX_CONFIGURED_SECS);
        assert_eq!(config.max_display, MAX_CONFIGURED_SECS);
    }
}
