//! X11 event pump: turns overlay window events into [`SurfaceEvent`]s

use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use crate::constants::mouse;
use crate::overlay::{OverlayInput, SurfaceEvent};

/// Block on the connection and hand every relevant event to `forward`.
/// The thread exits when `forward` returns false (receiver gone) or the
/// connection breaks.
pub fn spawn_event_pump<F>(conn: Arc<RustConnection>, forward: F) -> JoinHandle<()>
where
    F: Fn(SurfaceEvent) -> bool + Send + 'static,
{
    std::thread::spawn(move || {
        info!("X11 event pump started");
        loop {
            let event = match conn.wait_for_event() {
                Ok(event) => event,
                Err(e) => {
                    error!(error = ?e, "X11 connection lost, event pump stopping");
                    break;
                }
            };
            if let Some(surface_event) = translate_event(&event)
                && !forward(surface_event)
            {
                debug!("Event receiver gone, event pump stopping");
                break;
            }
        }
    })
}

fn translate_event(event: &Event) -> Option<SurfaceEvent> {
    match event {
        Event::ButtonPress(e) => {
            translate_button(e.detail, true, e.root_x, e.root_y).map(|input| SurfaceEvent::Input(e.event, input))
        }
        Event::ButtonRelease(e) => {
            translate_button(e.detail, false, e.root_x, e.root_y).map(|input| SurfaceEvent::Input(e.event, input))
        }
        // Only meaningful mid-drag; the overlay ignores moves otherwise
        Event::MotionNotify(e) => Some(SurfaceEvent::Input(
            e.event,
            OverlayInput::DragMove { x: i32::from(e.root_x), y: i32::from(e.root_y) },
        )),
        Event::DestroyNotify(e) => Some(SurfaceEvent::Destroyed(e.window)),
        _ => None,
    }
}

fn translate_button(button: u8, pressed: bool, root_x: i16, root_y: i16) -> Option<OverlayInput> {
    let (x, y) = (i32::from(root_x), i32::from(root_y));
    match (button, pressed) {
        (mouse::BUTTON_LEFT, true) => Some(OverlayInput::DragStart { x, y }),
        (mouse::BUTTON_LEFT, false) => Some(OverlayInput::DragEnd),
        (mouse::BUTTON_RIGHT, true) => Some(OverlayInput::RightClick),
        (mouse::WHEEL_UP, true) => Some(OverlayInput::Wheel { grow: true }),
        (mouse::WHEEL_DOWN, true) => Some(OverlayInput::Wheel { grow: false }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_left_button_drives_drag() {
        assert_eq!(translate_button(1, true, 10, -5), Some(OverlayInput::DragStart { x: 10, y: -5 }));
        assert_eq!(translate_button(1, false, 10, -5), Some(OverlayInput::DragEnd));
    }

    #[test]
    fn test_right_click_and_wheel() {
        assert_eq!(translate_button(3, true, 0, 0), Some(OverlayInput::RightClick));
        assert_eq!(translate_button(3, false, 0, 0), None);
        assert_eq!(translate_button(4, true, 0, 0), Some(OverlayInput::Wheel { grow: true }));
        assert_eq!(translate_button(5, true, 0, 0), Some(OverlayInput::Wheel { grow: false }));
        // Wheel "release" events carry no meaning
        assert_eq!(translate_button(4, false, 0, 0), None);
        assert_eq!(translate_button(2, true, 0, 0), None);
    }
}
