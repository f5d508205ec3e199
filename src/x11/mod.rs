//! X11 presentation backend
//!
//! Overlays are override-redirect windows on the root of the default screen.
//! The connection is shared between the scheduler thread (requests) and the
//! event pump thread (events); `RustConnection` is safe to use from both.

mod events;
mod window;

pub use events::spawn_event_pump;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xfixes::ConnectionExt as XFixesExt;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::constants;
use crate::overlay::{OverlaySurface, SurfaceFactory, SurfaceRequest};
use crate::types::Rect;
use window::X11Surface;

/// Pre-cached X11 atoms to avoid repeated roundtrips
pub struct CachedAtoms {
    pub net_workarea: Atom,
    pub net_wm_window_opacity: Atom,
    pub net_wm_state: Atom,
    pub net_wm_state_above: Atom,
}

impl CachedAtoms {
    pub fn new(conn: &RustConnection) -> Result<Self> {
        let intern = |name: &[u8]| -> Result<Atom> {
            let label = String::from_utf8_lossy(name);
            Ok(conn
                .intern_atom(false, name)
                .with_context(|| format!("Failed to intern {label} atom"))?
                .reply()
                .with_context(|| format!("Failed to get reply for {label} atom"))?
                .atom)
        };
        Ok(Self {
            net_workarea: intern(b"_NET_WORKAREA")?,
            net_wm_window_opacity: intern(b"_NET_WM_WINDOW_OPACITY")?,
            net_wm_state: intern(b"_NET_WM_STATE")?,
            net_wm_state_above: intern(b"_NET_WM_STATE_ABOVE")?,
        })
    }
}

/// Root-window facts captured once at connect time
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScreenInfo {
    pub root: Window,
    pub root_depth: u8,
    pub root_visual: Visualid,
    pub black_pixel: u32,
    pub width: u16,
    pub height: u16,
}

pub struct X11Surfaces {
    conn: Arc<RustConnection>,
    screen: ScreenInfo,
    atoms: CachedAtoms,
    /// Input shapes need XFixes; without it click-through is unavailable
    xfixes: bool,
}

impl X11Surfaces {
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None)
            .context("Failed to connect to X11 server. Is DISPLAY set correctly?")?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .context("X11 server reported no default screen")?;
        let screen = ScreenInfo {
            root: root.root,
            root_depth: root.root_depth,
            root_visual: root.root_visual,
            black_pixel: root.black_pixel,
            width: root.width_in_pixels,
            height: root.height_in_pixels,
        };
        info!(
            screen = screen_num,
            width = screen.width,
            height = screen.height,
            "Connected to X11 server"
        );

        let atoms = CachedAtoms::new(&conn).context("Failed to cache X11 atoms at startup")?;

        let xfixes = match conn
            .xfixes_query_version(constants::x11::XFIXES_MAJOR, constants::x11::XFIXES_MINOR)
            .map_err(anyhow::Error::from)
            .and_then(|cookie| cookie.reply().map_err(anyhow::Error::from))
        {
            Ok(version) => {
                debug!(major = version.major_version, minor = version.minor_version, "XFixes available");
                true
            }
            Err(e) => {
                warn!(error = ?e, "XFixes unavailable, click-through overlays will still take input");
                false
            }
        };

        Ok(Self {
            conn: Arc::new(conn),
            screen,
            atoms,
            xfixes,
        })
    }

    /// Shared connection for the event pump
    pub fn connection(&self) -> Arc<RustConnection> {
        Arc::clone(&self.conn)
    }

    fn query_workarea(&self) -> Result<Rect> {
        let prop = self
            .conn
            .get_property(false, self.screen.root, self.atoms.net_workarea, AtomEnum::CARDINAL, 0, 4)
            .context("Failed to query _NET_WORKAREA property")?
            .reply()
            .context("Failed to get reply for _NET_WORKAREA query")?;
        let values: Vec<u32> = prop
            .value32()
            .context("_NET_WORKAREA has unexpected format")?
            .collect();
        match values[..] {
            [x, y, width, height, ..] if width > 0 && height > 0 => {
                Ok(Rect::new(x as i32, y as i32, width, height))
            }
            _ => anyhow::bail!("_NET_WORKAREA not set by window manager"),
        }
    }
}

impl SurfaceFactory for X11Surfaces {
    /// `_NET_WORKAREA` of the first desktop, else the whole root window
    fn usable_area(&self) -> Rect {
        self.query_workarea().unwrap_or_else(|e| {
            debug!(error = %e, "Falling back to root window size for usable area");
            Rect::new(0, 0, u32::from(self.screen.width), u32::from(self.screen.height))
        })
    }

    fn open(&mut self, request: &SurfaceRequest<'_>) -> Result<Box<dyn OverlaySurface>> {
        let surface = X11Surface::create(Arc::clone(&self.conn), &self.screen, &self.atoms, self.xfixes, request)
            .with_context(|| format!("Failed to create overlay window for {}", request.path.display()))?;
        Ok(Box::new(surface))
    }
}
