//! Presentation seam: what the overlay needs from a windowing backend
//!
//! The scheduler never talks to a window system directly. A backend hands out
//! [`OverlaySurface`]s and reports pointer input back as [`OverlayInput`]
//! tagged with the surface id.

use anyhow::{Context, Result};
use std::path::Path;

use crate::types::{Dimensions, Position, Rect};

/// Backend-assigned identifier of a visible surface
pub type SurfaceId = u32;

/// Everything a backend needs to put one overlay on screen
#[derive(Debug, Clone, Copy)]
pub struct SurfaceRequest<'a> {
    pub path: &'a Path,
    pub position: Position,
    pub size: Dimensions,
    pub opacity: f64,
    pub always_on_top: bool,
    /// Pointer input passes through to whatever is below
    pub input_transparent: bool,
}

pub trait OverlaySurface {
    fn id(&self) -> SurfaceId;
    fn move_to(&mut self, position: Position) -> Result<()>;
    fn resize(&mut self, size: Dimensions) -> Result<()>;
    /// Remove the surface from screen; calling it again must be harmless
    fn close(&mut self) -> Result<()>;
}

pub trait SurfaceFactory {
    /// Usable area of the primary display
    fn usable_area(&self) -> Rect;

    /// Natural pixel size of the image, used to keep the aspect ratio
    fn natural_size(&self, path: &Path) -> Result<Dimensions> {
        probe_dimensions(path)
    }

    fn open(&mut self, request: &SurfaceRequest<'_>) -> Result<Box<dyn OverlaySurface>>;
}

/// Pointer input delivered by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayInput {
    /// Primary button pressed at root coordinates
    DragStart { x: i32, y: i32 },
    DragMove { x: i32, y: i32 },
    DragEnd,
    /// One wheel step
    Wheel { grow: bool },
    RightClick,
}

/// What an event pump forwards to the scheduler thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    Input(SurfaceId, OverlayInput),
    /// The surface went away without being closed by us (or we closed it
    /// and this is the echo; the scheduler tolerates both)
    Destroyed(SurfaceId),
}

/// Read only the image header to get its size
pub fn probe_dimensions(path: &Path) -> Result<Dimensions> {
    let (width, height) = image::image_dimensions(path)
        .with_context(|| format!("Failed to read image dimensions of {}", path.display()))?;
    Ok(Dimensions::new(width, height))
}
