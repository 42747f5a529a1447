//! Raw host events and the normalized events forwarded to applications

use bitflags::bitflags;

use crate::geometry::{Point, Size};

bitflags! {
    /// Modifier key state, laid out like the native event modifier flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u64 {
        const CAPS_LOCK = 1 << 16;
        const SHIFT = 1 << 17;
        const CONTROL = 1 << 18;
        const OPTION = 1 << 19;
        const COMMAND = 1 << 20;
    }
}

/// An event as delivered by the window host
///
/// Key codes are native virtual key codes and locations use a bottom-left
/// origin in drawable pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    KeyDown {
        keycode: u16,
        character: Option<char>,
        repeat: bool,
    },
    KeyUp {
        keycode: u16,
        character: Option<char>,
    },
    FlagsChanged {
        flags: u64,
    },
    MouseDown {
        button: i64,
        location: Point,
    },
    MouseUp {
        button: i64,
        location: Point,
    },
    MouseMoved {
        location: Point,
    },
    MouseDragged {
        button: i64,
        location: Point,
    },
    MouseEntered,
    MouseExited,
    /// The drawable changed size
    Resized {
        size: Size,
    },
    /// A fullscreen enter/exit requested by the surface has settled
    TransitionFinished,
    /// The user asked to close the window
    CloseRequested,
}

/// Keys without a printable character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Return,
    Escape,
    Tab,
    Backspace,
    Delete,
    Insert,
    Left,
    Right,
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
    F(u8),
    Shift,
    Control,
    Alt,
    Command,
    CapsLock,
}

/// A translated key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Character(char),
    Named(NamedKey),
    /// A native key code with no translation
    Unknown(u16),
}

impl Key {
    /// Integer key code in the creative-coding framework convention
    ///
    /// Characters map to their code point, named keys to the framework's
    /// special key constants, unknown keys to -1.
    pub fn code(&self) -> i32 {
        match self {
            Key::Character(c) => *c as i32,
            Key::Named(named) => match named {
                NamedKey::Return => 13,
                NamedKey::Escape => 27,
                NamedKey::Tab => 9,
                NamedKey::Backspace => 8,
                NamedKey::Delete => 127,
                NamedKey::F(n) => 256 + i32::from(*n),
                NamedKey::Left => 356,
                NamedKey::Up => 357,
                NamedKey::Right => 358,
                NamedKey::Down => 359,
                NamedKey::PageUp => 360,
                NamedKey::PageDown => 361,
                NamedKey::Home => 362,
                NamedKey::End => 363,
                NamedKey::Insert => 364,
                NamedKey::Shift => 0x100,
                NamedKey::Control => 0x200,
                NamedKey::Alt => 0x300,
                NamedKey::Command => 0x400,
                NamedKey::CapsLock => 0x500,
            },
            Key::Unknown(_) => -1,
        }
    }
}

/// A pointer button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    Other(u8),
}

impl MouseButton {
    /// Button id in the framework convention (left 0, middle 1, right 2)
    pub fn id(&self) -> i32 {
        match self {
            MouseButton::Left => 0,
            MouseButton::Middle => 1,
            MouseButton::Right => 2,
            MouseButton::Other(n) => i32::from(*n),
        }
    }
}

/// A normalized input event, positions in top-left-origin surface pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyPressed(Key),
    KeyReleased(Key),
    MouseMoved(Point),
    MouseDragged(Point, MouseButton),
    MousePressed(Point, MouseButton),
    MouseReleased(Point, MouseButton),
    MouseEntered,
    MouseExited,
}

impl InputEvent {
    /// Pointer position carried by the event, if any
    pub fn position(&self) -> Option<Point> {
        match self {
            InputEvent::MouseMoved(p)
            | InputEvent::MouseDragged(p, _)
            | InputEvent::MousePressed(p, _)
            | InputEvent::MouseReleased(p, _) => Some(*p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_codes() {
        assert_eq!(Key::Character('a').code(), 97);
        assert_eq!(Key::Named(NamedKey::Return).code(), 13);
        assert_eq!(Key::Named(NamedKey::F(1)).code(), 257);
        assert_eq!(Key::Named(NamedKey::F(12)).code(), 268);
        assert_eq!(Key::Named(NamedKey::Up).code(), 357);
        assert_eq!(Key::Unknown(0x7f).code(), -1);
    }

    #[test]
    fn test_button_ids() {
        assert_eq!(MouseButton::Left.id(), 0);
        assert_eq!(MouseButton::Middle.id(), 1);
        assert_eq!(MouseButton::Right.id(), 2);
        assert_eq!(MouseButton::Other(4).id(), 4);
    }

    #[test]
    fn test_event_position() {
        let p = Point::new(3.0, 4.0);
        assert_eq!(InputEvent::MouseDragged(p, MouseButton::Left).position(), Some(p));
        assert_eq!(InputEvent::MouseEntered.position(), None);
    }
}
