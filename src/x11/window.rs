//! One overlay window

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};
use x11rb::connection::Connection;
use x11rb::protocol::shape;
use x11rb::protocol::xfixes::ConnectionExt as XFixesExt;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as WrapperExt;

use super::{CachedAtoms, ScreenInfo};
use crate::constants;
use crate::overlay::{OverlaySurface, SurfaceId, SurfaceRequest};
use crate::types::{Dimensions, Position};

pub struct X11Surface {
    conn: Arc<RustConnection>,
    window: Window,
    destroyed: bool,
}

impl X11Surface {
    pub fn create(
        conn: Arc<RustConnection>,
        screen: &ScreenInfo,
        atoms: &CachedAtoms,
        xfixes: bool,
        request: &SurfaceRequest<'_>,
    ) -> Result<Self> {
        let window = conn.generate_id().context("Failed to generate X11 window ID")?;
        conn.create_window(
            screen.root_depth,
            window,
            screen.root,
            clamp_i16(request.position.x),
            clamp_i16(request.position.y),
            clamp_u16(request.size.width),
            clamp_u16(request.size.height),
            0,
            WindowClass::INPUT_OUTPUT,
            screen.root_visual,
            &CreateWindowAux::new()
                .override_redirect(constants::x11::OVERRIDE_REDIRECT)
                .background_pixel(screen.black_pixel)
                .event_mask(
                    EventMask::STRUCTURE_NOTIFY
                        | EventMask::BUTTON_PRESS
                        | EventMask::BUTTON_RELEASE
                        | EventMask::POINTER_MOTION,
                ),
        )
        .context("Failed to create overlay window")?;

        // From here on a failure must not leak the window
        let surface = Self { conn, window, destroyed: false };
        surface.setup_properties(atoms, xfixes, request)?;

        surface.conn.map_window(window).context("Failed to map overlay window")?;
        if request.always_on_top {
            surface
                .conn
                .configure_window(window, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))
                .context("Failed to raise overlay window")?;
        }
        surface.conn.flush().context("Failed to flush X11 connection after mapping overlay")?;

        info!(window, path = %request.path.display(), "Mapped overlay window");
        Ok(surface)
    }

    /// Opacity, WM_CLASS, always-on-top and the click-through input shape
    fn setup_properties(&self, atoms: &CachedAtoms, xfixes: bool, request: &SurfaceRequest<'_>) -> Result<()> {
        let conn = &self.conn;
        let window = self.window;

        conn.change_property32(
            PropMode::REPLACE,
            window,
            atoms.net_wm_window_opacity,
            AtomEnum::CARDINAL,
            &[opacity_cardinal(request.opacity)],
        )
        .context("Failed to set window opacity")?;

        conn.change_property8(
            PropMode::REPLACE,
            window,
            AtomEnum::WM_CLASS,
            AtomEnum::STRING,
            constants::x11::WM_CLASS,
        )
        .context("Failed to set WM_CLASS")?;

        if request.always_on_top {
            conn.change_property32(
                PropMode::REPLACE,
                window,
                atoms.net_wm_state,
                AtomEnum::ATOM,
                &[atoms.net_wm_state_above],
            )
            .context("Failed to set window always-on-top")?;
        }

        if request.input_transparent && xfixes {
            // An empty input region lets every pointer event fall through
            let region = conn.generate_id().context("Failed to generate ID for input region")?;
            conn.xfixes_create_region(region, &[])
                .context("Failed to create empty input region")?;
            conn.xfixes_set_window_shape_region(window, shape::SK::INPUT, 0, 0, region)
                .context("Failed to set input shape")?;
            conn.xfixes_destroy_region(region)
                .context("Failed to destroy input region")?;
            debug!(window, "Overlay is click-through");
        }

        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        if self.destroyed {
            return Ok(());
        }
        self.destroyed = true;
        self.conn
            .destroy_window(self.window)
            .context(format!("Failed to destroy overlay window {}", self.window))?;
        self.conn.flush().context("Failed to flush X11 connection after destroy")?;
        debug!(window = self.window, "Destroyed overlay window");
        Ok(())
    }
}

impl OverlaySurface for X11Surface {
    fn id(&self) -> SurfaceId {
        self.window
    }

    fn move_to(&mut self, position: Position) -> Result<()> {
        self.conn
            .configure_window(self.window, &ConfigureWindowAux::new().x(position.x).y(position.y))
            .context(format!("Failed to move overlay window {}", self.window))?;
        self.conn.flush().context("Failed to flush X11 connection after move")?;
        Ok(())
    }

    fn resize(&mut self, size: Dimensions) -> Result<()> {
        self.conn
            .configure_window(
                self.window,
                &ConfigureWindowAux::new()
                    .width(u32::from(clamp_u16(size.width)))
                    .height(u32::from(clamp_u16(size.height))),
            )
            .context(format!("Failed to resize overlay window {}", self.window))?;
        self.conn.flush().context("Failed to flush X11 connection after resize")?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.destroy()
    }
}

impl Drop for X11Surface {
    fn drop(&mut self) {
        let _ = self.destroy();
    }
}

/// `_NET_WM_WINDOW_OPACITY` is a CARDINAL scaled to the full u32 range
fn opacity_cardinal(opacity: f64) -> u32 {
    (opacity.clamp(0.0, 1.0) * f64::from(u32::MAX)).round() as u32
}

fn clamp_i16(value: i32) -> i16 {
    value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

/// X11 forbids zero-sized windows
fn clamp_u16(value: u32) -> u16 {
    value.clamp(1, u32::from(u16::MAX)) as u16
}
