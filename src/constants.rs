//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// X11 protocol constants
pub mod x11 {
    /// Override redirect flag for unmanaged windows
    pub const OVERRIDE_REDIRECT: u32 = 1;

    /// WM_CLASS value (instance\0class\0) set on every overlay window
    pub const WM_CLASS: &[u8] = b"glimmr\0glimmr\0";

    /// XFixes version we ask the server for (input shapes need >= 2.0)
    pub const XFIXES_MAJOR: u32 = 5;
    pub const XFIXES_MINOR: u32 = 0;
}

/// Mouse button constants
pub mod mouse {
    /// Left mouse button number
    pub const BUTTON_LEFT: u8 = 1;

    /// Right mouse button number
    pub const BUTTON_RIGHT: u8 = 3;

    /// Wheel up (X11 reports wheel steps as buttons 4/5)
    pub const WHEEL_UP: u8 = 4;

    /// Wheel down
    pub const WHEEL_DOWN: u8 = 5;
}

/// Default overlay placement constants
pub mod positioning {
    /// Distance kept from the screen edges when picking a random position
    pub const RANDOM_PADDING: i32 = 100;

    /// Margin from the corner for the four corner modes
    pub const CORNER_MARGIN: i32 = 50;
}

/// Overlay size limits
pub mod sizing {
    /// Smallest edge of an initially rendered overlay
    pub const RENDER_MIN_EDGE: u32 = 100;

    /// Largest edge of any overlay
    pub const MAX_EDGE: u32 = 800;

    /// Smallest edge reachable by wheel resizing
    pub const RESIZE_MIN_EDGE: u32 = 50;

    /// Scale applied per wheel step when growing
    pub const GROW_FACTOR: f64 = 1.1;

    /// Scale applied per wheel step when shrinking
    pub const SHRINK_FACTOR: f64 = 0.9;
}

/// Scheduler timing constants
pub mod timing {
    use std::time::Duration;

    /// Auto-hide used for previews (`show` from the control socket)
    pub const PREVIEW_DURATION: Duration = Duration::from_secs(5);

    /// How long the daemon loop sleeps when no timer is pending
    pub const IDLE_POLL: Duration = Duration::from_secs(1);

    /// Longest configurable interval or display time (one year)
    pub const MAX_CONFIGURED_SECS: u64 = 365 * 24 * 60 * 60;

    /// Longest delay a timer accepts; anything longer is capped
    pub const MAX_TIMER_DELAY: Duration = Duration::from_secs(MAX_CONFIGURED_SECS);
}

/// Configuration file constants
pub mod config {
    /// Application directory name under the XDG config dir
    pub const APP_DIR: &str = "glimmr";

    /// Configuration filename
    pub const FILENAME: &str = "config.json";

    /// Environment variable overriding the config file location
    pub const PATH_ENV: &str = "GLIMMR_CONFIG";

    /// Folder (under the pictures dir) scanned for a first-run library
    pub const DEFAULT_LIBRARY_DIR: &str = "glimmr";
}

/// Library constants
pub mod library {
    /// Only files with this extension are accepted into the library
    pub const IMAGE_EXTENSION: &str = "gif";
}

/// Control socket constants
pub mod ipc {
    /// Socket path relative to the runtime (or cache) dir
    pub const SOCKET_PATH: &str = "glimmr/control.sock";

    /// Maximum message size (10 MB) to prevent DoS via memory exhaustion
    pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

    /// First pause after a failed accept; doubles per consecutive failure
    pub const ACCEPT_RETRY_MIN: std::time::Duration = std::time::Duration::from_millis(100);

    /// Upper bound for the accept retry pause
    pub const ACCEPT_RETRY_MAX: std::time::Duration = std::time::Duration::from_secs(5);
}
