//! Control messages between the `glimmr` CLI and a running daemon

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::scheduler::Phase;

/// Requests sent from the CLI to the daemon
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ControlRequest {
    /// Begin the display cycle
    Start,

    /// Stop the cycle and hide whatever is visible
    Stop,

    /// Preview an image now; `None` picks a random library image
    ShowNow { path: Option<PathBuf> },

    /// New target edge length for overlays
    SetGifSize(u32),

    AddPath(PathBuf),
    RemovePath(PathBuf),

    Status,

    /// Health check
    Ping,

    /// Request graceful shutdown
    Shutdown,
}

/// Responses sent from the daemon back to the CLI
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ControlResponse {
    /// Request was processed
    Ok,

    Status {
        running: bool,
        phase: Phase,
        showing: Option<PathBuf>,
        library_size: usize,
    },

    /// Health check response
    Pong,

    /// Error occurred
    Error(String),
}
