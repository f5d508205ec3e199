//! One visible image on screen and its bookkeeping
//!
//! An [`OverlayLifecycle`] owns its surface, its auto-hide timer and the
//! drag/resize state. However it ends (timeout, right-click, external stop),
//! [`OverlayLifecycle::close`] reports the close exactly once.

pub mod headless;
pub mod placement;
pub mod surface;

use anyhow::Result;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::ConfigStore;
use crate::timer::OneShot;
use crate::types::{Dimensions, Position, SavedPlacement};

pub use surface::{OverlayInput, OverlaySurface, SurfaceEvent, SurfaceFactory, SurfaceId, SurfaceRequest};

/// Why an overlay went away
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CloseReason {
    /// Auto-hide timer fired
    Timeout,
    /// User right-clicked it
    Dismissed,
    /// Scheduler was stopped
    Stopped,
    /// Another overlay took its place
    Replaced,
    /// The window disappeared underneath us
    WindowGone,
}

/// Regular timed display versus a one-off preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    Cycle,
    Preview,
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    /// Pointer position relative to the overlay's top-left corner
    grab_offset: Position,
}

pub struct OverlayLifecycle {
    path: PathBuf,
    filename: String,
    kind: OverlayKind,
    natural: Dimensions,
    position: Position,
    size: Dimensions,
    surface: Box<dyn OverlaySurface>,
    hide_timer: OneShot,
    drag: Option<DragState>,
    resized: bool,
    closed: bool,
}

impl OverlayLifecycle {
    /// Resolve placement, put the surface on screen and arm auto-hide.
    ///
    /// Errors here are presentation failures (unreadable image, backend
    /// refused the window); nothing is left on screen when they happen.
    pub fn open<R: Rng>(
        path: &Path,
        kind: OverlayKind,
        visible_for: Duration,
        store: &ConfigStore,
        factory: &mut dyn SurfaceFactory,
        rng: &mut R,
        now: Instant,
    ) -> Result<Self> {
        let config = store.get();
        let filename = filename_key(path);
        let natural = factory.natural_size(path)?;
        let (position, size) =
            placement::resolve(config, &filename, natural, factory.usable_area(), rng);

        let surface = factory.open(&SurfaceRequest {
            path,
            position,
            size,
            opacity: config.opacity,
            always_on_top: config.always_on_top,
            input_transparent: config.input_transparent(),
        })?;

        let mut hide_timer = OneShot::new();
        hide_timer.arm(now, visible_for);

        info!(
            file = %filename,
            surface = surface.id(),
            x = position.x,
            y = position.y,
            width = size.width,
            height = size.height,
            seconds = visible_for.as_secs(),
            "Overlay shown"
        );

        Ok(Self {
            path: path.to_path_buf(),
            filename,
            kind,
            natural,
            position,
            size,
            surface,
            hide_timer,
            drag: None,
            resized: false,
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> OverlayKind {
        self.kind
    }

    pub fn surface_id(&self) -> SurfaceId {
        self.surface.id()
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn size(&self) -> Dimensions {
        self.size
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn hide_deadline(&self) -> Option<Instant> {
        self.hide_timer.deadline()
    }

    /// Close if the auto-hide deadline has passed
    pub fn poll_timeout(&mut self, now: Instant) -> Option<CloseReason> {
        if self.hide_timer.fire_if_due(now) {
            self.close(CloseReason::Timeout)
        } else {
            None
        }
    }

    /// Tear down the surface. Returns the reason on the first call only;
    /// later calls are no-ops returning `None`.
    pub fn close(&mut self, reason: CloseReason) -> Option<CloseReason> {
        if self.closed {
            debug!(file = %self.filename, ?reason, "Overlay already closed");
            return None;
        }
        self.closed = true;
        self.hide_timer.cancel();
        self.drag = None;

        if let Err(e) = self.surface.close() {
            warn!(file = %self.filename, error = ?e, "Failed to close overlay surface");
        }
        info!(file = %self.filename, ?reason, "Overlay closed");
        Some(reason)
    }

    /// Apply pointer input. Returns a close reason if the input closed the overlay.
    pub fn handle_input(&mut self, input: OverlayInput, store: &mut ConfigStore) -> Option<CloseReason> {
        if self.closed {
            return None;
        }
        let config = store.get();

        match input {
            OverlayInput::DragStart { x, y } => {
                if !config.drag_allowed() {
                    debug!(file = %self.filename, "Drag ignored, click-through without persistence");
                    return None;
                }
                self.drag = Some(DragState {
                    grab_offset: Position::new(x - self.position.x, y - self.position.y),
                });
                debug!(file = %self.filename, x, y, "Drag started");
            }
            OverlayInput::DragMove { x, y } => {
                if let Some(drag) = self.drag {
                    let target = Position::new(x - drag.grab_offset.x, y - drag.grab_offset.y);
                    self.move_to(target);
                }
            }
            OverlayInput::DragEnd => {
                if self.drag.take().is_some() {
                    debug!(file = %self.filename, x = self.position.x, y = self.position.y, "Drag ended");
                    self.remember_placement(store);
                }
            }
            OverlayInput::Wheel { grow } => {
                if config.click_through {
                    return None;
                }
                let size = placement::wheel_resize(self.size, grow);
                self.resize_to(size);
                self.remember_placement(store);
            }
            OverlayInput::RightClick => {
                if !config.click_through {
                    return self.close(CloseReason::Dismissed);
                }
            }
        }
        None
    }

    /// Re-scale for a new target size setting
    pub fn apply_target_size(&mut self, target: u32, store: &mut ConfigStore) {
        if self.closed {
            return;
        }
        let size = placement::render_size(self.natural, target);
        self.resize_to(size);
        self.remember_placement(store);
    }

    fn move_to(&mut self, position: Position) {
        if let Err(e) = self.surface.move_to(position) {
            warn!(file = %self.filename, error = ?e, "Failed to move overlay");
            return;
        }
        self.position = position;
    }

    fn resize_to(&mut self, size: Dimensions) {
        if let Err(e) = self.surface.resize(size) {
            warn!(file = %self.filename, error = ?e, "Failed to resize overlay");
            return;
        }
        self.size = size;
        self.resized = true;
    }

    /// Persist placement (with size once resized) if persistence is enabled
    fn remember_placement(&self, store: &mut ConfigStore) {
        if !store.get().position_persistence {
            return;
        }
        let placement = if self.resized {
            SavedPlacement::with_size(self.position, self.size)
        } else {
            SavedPlacement::at(self.position)
        };
        store.set_custom_position(&self.filename, placement);
    }
}

impl Drop for OverlayLifecycle {
    fn drop(&mut self) {
        if !self.closed
            && let Err(e) = self.surface.close()
        {
            warn!(file = %self.filename, error = ?e, "Failed to close overlay surface on drop");
        }
    }
}

/// Saved placements are keyed by bare filename, so same-named files in
/// different directories share one entry.
pub fn filename_key(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
