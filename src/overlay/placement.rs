//! Where an overlay goes and how big it is

use rand::Rng;

use crate::config::{Configuration, PositionMode};
use crate::constants::{positioning, sizing};
use crate::types::{Dimensions, Position, Rect};

/// Scale `natural` so its longer edge equals `target`, then keep both edges
/// inside the render limits while preserving the aspect ratio where possible.
pub fn render_size(natural: Dimensions, target: u32) -> Dimensions {
    let min = f64::from(sizing::RENDER_MIN_EDGE);
    let max = f64::from(sizing::MAX_EDGE);

    if natural.width == 0 || natural.height == 0 {
        return Dimensions::square(target.clamp(sizing::RENDER_MIN_EDGE, sizing::MAX_EDGE));
    }

    let (w, h) = (f64::from(natural.width), f64::from(natural.height));
    let scale = f64::from(target) / w.max(h);
    let mut width = (w * scale).floor().max(1.0);
    let mut height = (h * scale).floor().max(1.0);

    if width < min || height < min {
        let up = min / width.min(height);
        width = (width * up).round();
        height = (height * up).round();
    }

    if width > max || height > max {
        let aspect = width / height;
        if width > height {
            width = max;
            height = (max / aspect).floor();
        } else {
            height = max;
            width = (max * aspect).floor();
        }
    }

    // Extreme aspect ratios can still land outside the limits on the short edge
    Dimensions::new(
        (width as u32).clamp(sizing::RENDER_MIN_EDGE, sizing::MAX_EDGE),
        (height as u32).clamp(sizing::RENDER_MIN_EDGE, sizing::MAX_EDGE),
    )
}

/// One wheel step of resizing
pub fn wheel_resize(current: Dimensions, grow: bool) -> Dimensions {
    let factor = if grow { sizing::GROW_FACTOR } else { sizing::SHRINK_FACTOR };
    let step = |edge: u32| {
        ((f64::from(edge) * factor) as u32).clamp(sizing::RESIZE_MIN_EDGE, sizing::MAX_EDGE)
    };
    Dimensions::new(step(current.width), step(current.height))
}

/// Position from the configured mode, relative to the usable area
pub fn default_position<R: Rng>(
    mode: PositionMode,
    area: Rect,
    size: Dimensions,
    rng: &mut R,
) -> Position {
    let free_w = i64::from(area.width) - i64::from(size.width);
    let free_h = i64::from(area.height) - i64::from(size.height);
    let margin = i64::from(positioning::CORNER_MARGIN);

    let (x, y) = match mode {
        PositionMode::Center => (free_w / 2, free_h / 2),
        PositionMode::TopLeft => (margin, margin),
        PositionMode::TopRight => (free_w - margin, margin),
        PositionMode::BottomLeft => (margin, free_h - margin),
        PositionMode::BottomRight => (free_w - margin, free_h - margin),
        PositionMode::Random => {
            let pad = i64::from(positioning::RANDOM_PADDING);
            let pick = |rng: &mut R, upper: i64| {
                if upper > pad { rng.random_range(pad..=upper) } else { pad }
            };
            let x = pick(rng, free_w - pad);
            let y = pick(rng, free_h - pad);
            (x, y)
        }
    };

    Position::new(area.x + clamp_i32(x), area.y + clamp_i32(y))
}

fn clamp_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Final placement for `filename`: the saved one when persistence is on and
/// one exists, otherwise computed from the position mode.
pub fn resolve<R: Rng>(
    config: &Configuration,
    filename: &str,
    natural: Dimensions,
    area: Rect,
    rng: &mut R,
) -> (Position, Dimensions) {
    let rendered = render_size(natural, config.gif_size);

    if config.position_persistence
        && let Some(saved) = config.custom_positions.get(filename)
    {
        return (saved.position(), saved.dimensions().unwrap_or(rendered));
    }

    (default_position(config.position_mode, area, rendered, rng), rendered)
}
