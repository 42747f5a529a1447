//! NSEvent conversion into host events

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use log::trace;
use objc2_app_kit::{NSEvent, NSEventMask, NSEventType, NSView};
use objc2_foundation::{NSPoint, NSRect, NSSize};

use crate::geometry::Point;
use crate::input::RawEvent;

/// Events collected by the view, the window delegate and the monitors
pub type EventQueue = Rc<RefCell<VecDeque<RawEvent>>>;

/// Event kinds delivered to the surface
pub fn input_mask() -> NSEventMask {
    NSEventMask::KeyDown
        | NSEventMask::KeyUp
        | NSEventMask::FlagsChanged
        | NSEventMask::LeftMouseDown
        | NSEventMask::LeftMouseUp
        | NSEventMask::RightMouseDown
        | NSEventMask::RightMouseUp
        | NSEventMask::OtherMouseDown
        | NSEventMask::OtherMouseUp
        | NSEventMask::MouseMoved
        | NSEventMask::LeftMouseDragged
        | NSEventMask::RightMouseDragged
        | NSEventMask::OtherMouseDragged
}

/// Event location in the view's backing pixels, bottom-left origin
///
/// Events without a window (global monitor events) carry screen
/// coordinates and are mapped through the view's window.
pub fn view_location(view: &NSView, event: &NSEvent) -> Point {
    let mut location = unsafe { event.locationInWindow() };
    if unsafe { event.windowNumber() } == 0 {
        if let Some(window) = view.window() {
            let rect = window.convertRectFromScreen(NSRect::new(location, NSSize::new(0.0, 0.0)));
            location = rect.origin;
        }
    }

    let point = view.convertPoint_fromView(location, None);
    let backing: NSPoint = view.convertPointToBacking(point);
    Point::new(backing.x, backing.y)
}

/// Convert an NSEvent; events the surface does not handle give `None`
pub fn raw_event(event: &NSEvent, location: Point) -> Option<RawEvent> {
    let kind = unsafe { event.r#type() };
    let raw = match kind {
        NSEventType::KeyDown => RawEvent::KeyDown {
            keycode: unsafe { event.keyCode() },
            character: characters(event),
            repeat: unsafe { event.isARepeat() },
        },
        NSEventType::KeyUp => RawEvent::KeyUp {
            keycode: unsafe { event.keyCode() },
            character: characters(event),
        },
        NSEventType::FlagsChanged => RawEvent::FlagsChanged {
            flags: unsafe { event.modifierFlags() }.0 as u64,
        },
        NSEventType::LeftMouseDown | NSEventType::RightMouseDown | NSEventType::OtherMouseDown => {
            RawEvent::MouseDown {
                button: button(event),
                location,
            }
        }
        NSEventType::LeftMouseUp | NSEventType::RightMouseUp | NSEventType::OtherMouseUp => {
            RawEvent::MouseUp {
                button: button(event),
                location,
            }
        }
        NSEventType::MouseMoved => RawEvent::MouseMoved { location },
        NSEventType::LeftMouseDragged
        | NSEventType::RightMouseDragged
        | NSEventType::OtherMouseDragged => RawEvent::MouseDragged {
            button: button(event),
            location,
        },
        NSEventType::MouseEntered => RawEvent::MouseEntered,
        NSEventType::MouseExited => RawEvent::MouseExited,
        other => {
            trace!("Unhandled event type {:?}", other);
            return None;
        }
    };
    Some(raw)
}

fn button(event: &NSEvent) -> i64 {
    unsafe { event.buttonNumber() as i64 }
}

fn characters(event: &NSEvent) -> Option<char> {
    let characters = unsafe { event.charactersIgnoringModifiers() }?;
    characters.to_string().chars().next()
}
