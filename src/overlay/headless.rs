//! Display-less backend: surfaces exist only as log lines

use anyhow::Result;
use std::path::Path;
use tracing::{debug, info};

use super::surface::{probe_dimensions, OverlaySurface, SurfaceFactory, SurfaceId, SurfaceRequest};
use crate::types::{Dimensions, Position, Rect};

pub struct HeadlessSurfaces {
    area: Rect,
    next_id: SurfaceId,
}

impl HeadlessSurfaces {
    pub fn new(area: Rect) -> Self {
        info!(width = area.width, height = area.height, "Using headless presentation backend");
        Self { area, next_id: 1 }
    }
}

impl Default for HeadlessSurfaces {
    fn default() -> Self {
        Self::new(Rect::new(0, 0, 1920, 1080))
    }
}

impl SurfaceFactory for HeadlessSurfaces {
    fn usable_area(&self) -> Rect {
        self.area
    }

    /// Unreadable headers still get a square, so placement can be exercised
    /// without real images
    fn natural_size(&self, path: &Path) -> Result<Dimensions> {
        Ok(probe_dimensions(path).unwrap_or_else(|e| {
            debug!(path = %path.display(), error = %e, "Probe failed, assuming square image");
            Dimensions::square(1)
        }))
    }

    fn open(&mut self, request: &SurfaceRequest<'_>) -> Result<Box<dyn OverlaySurface>> {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        info!(
            surface = id,
            path = %request.path.display(),
            x = request.position.x,
            y = request.position.y,
            width = request.size.width,
            height = request.size.height,
            opacity = request.opacity,
            "Headless surface opened"
        );
        Ok(Box::new(HeadlessSurface { id, closed: false }))
    }
}

struct HeadlessSurface {
    id: SurfaceId,
    closed: bool,
}

impl OverlaySurface for HeadlessSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn move_to(&mut self, position: Position) -> Result<()> {
        debug!(surface = self.id, x = position.x, y = position.y, "Headless surface moved");
        Ok(())
    }

    fn resize(&mut self, size: Dimensions) -> Result<()> {
        debug!(surface = self.id, width = size.width, height = size.height, "Headless surface resized");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            info!(surface = self.id, "Headless surface closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_image_falls_back_to_square() {
        let surfaces = HeadlessSurfaces::default();
        let size = surfaces.natural_size(Path::new("/definitely/not/here.gif")).unwrap();
        assert_eq!(size.width, size.height);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut surfaces = HeadlessSurfaces::default();
        let request = SurfaceRequest {
            path: Path::new("a.gif"),
            position: Position::default(),
            size: Dimensions::square(100),
            opacity: 1.0,
            always_on_top: false,
            input_transparent: false,
        };
        let a = surfaces.open(&request).unwrap();
        let b = surfaces.open(&request).unwrap();
        assert_ne!(a.id(), b.id());
    }
}
