//! Translation of raw host events into normalized input events

use log::debug;

use crate::geometry::Point;
use crate::input::event::{InputEvent, Key, Modifiers, MouseButton, NamedKey, RawEvent};

/// Modifier flags reported as key presses, with the key they stand for
const MODIFIER_KEYS: [(Modifiers, NamedKey); 5] = [
    (Modifiers::SHIFT, NamedKey::Shift),
    (Modifiers::CONTROL, NamedKey::Control),
    (Modifiers::OPTION, NamedKey::Alt),
    (Modifiers::COMMAND, NamedKey::Command),
    (Modifiers::CAPS_LOCK, NamedKey::CapsLock),
];

/// Translates host events into [`InputEvent`]s
///
/// Tracks the last modifier state so flag changes can be reported as
/// individual modifier key presses and releases.
#[derive(Debug, Default)]
pub struct InputTranslator {
    modifiers: Modifiers,
}

impl InputTranslator {
    /// Create a new input translator
    pub fn new() -> Self {
        Self::default()
    }

    /// Current modifier state
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Translate a native virtual key code to a named key
    pub fn translate_keycode(&self, keycode: u16) -> Option<NamedKey> {
        let key = match keycode {
            0x24 | 0x4C => NamedKey::Return, // Return, keypad Enter
            0x30 => NamedKey::Tab,
            0x33 => NamedKey::Backspace,
            0x35 => NamedKey::Escape,
            0x37 | 0x36 => NamedKey::Command,
            0x38 | 0x3C => NamedKey::Shift,
            0x39 => NamedKey::CapsLock,
            0x3A | 0x3D => NamedKey::Alt,
            0x3B | 0x3E => NamedKey::Control,
            0x7A => NamedKey::F(1),
            0x78 => NamedKey::F(2),
            0x63 => NamedKey::F(3),
            0x76 => NamedKey::F(4),
            0x60 => NamedKey::F(5),
            0x61 => NamedKey::F(6),
            0x62 => NamedKey::F(7),
            0x64 => NamedKey::F(8),
            0x65 => NamedKey::F(9),
            0x6D => NamedKey::F(10),
            0x67 => NamedKey::F(11),
            0x6F => NamedKey::F(12),
            0x72 => NamedKey::Insert, // Help
            0x73 => NamedKey::Home,
            0x74 => NamedKey::PageUp,
            0x75 => NamedKey::Delete,
            0x77 => NamedKey::End,
            0x79 => NamedKey::PageDown,
            0x7B => NamedKey::Left,
            0x7C => NamedKey::Right,
            0x7D => NamedKey::Down,
            0x7E => NamedKey::Up,
            _ => return None,
        };
        Some(key)
    }

    /// Translate a key code and its produced character into a key
    ///
    /// Named keys win over characters since the host reports private-use
    /// characters for arrows and function keys.
    pub fn translate_key(&self, keycode: u16, character: Option<char>) -> Key {
        if let Some(named) = self.translate_keycode(keycode) {
            return Key::Named(named);
        }
        match character {
            Some(c) if !c.is_control() => Key::Character(c),
            _ => Key::Unknown(keycode),
        }
    }

    /// Translate a native button number to a pointer button
    pub fn translate_button(&self, button: i64) -> MouseButton {
        match button {
            0 => MouseButton::Left,
            1 => MouseButton::Right,
            2 => MouseButton::Middle,
            n => MouseButton::Other(u8::try_from(n).unwrap_or(u8::MAX)),
        }
    }

    /// Flip a bottom-left-origin location into top-left surface coordinates
    pub fn translate_location(&self, location: Point, surface_height: f64) -> Point {
        Point::new(location.x, surface_height - location.y)
    }

    /// Translate one host event
    ///
    /// Returns an empty list for events that carry no input (resize,
    /// transition and close notifications). Flag changes may produce several
    /// modifier events, in the order shift, control, alt, command, caps lock.
    pub fn translate(&mut self, event: &RawEvent, surface_height: f64) -> Vec<InputEvent> {
        match *event {
            RawEvent::KeyDown {
                keycode, character, ..
            } => vec![InputEvent::KeyPressed(self.translate_key(keycode, character))],
            RawEvent::KeyUp { keycode, character } => {
                vec![InputEvent::KeyReleased(self.translate_key(keycode, character))]
            }
            RawEvent::FlagsChanged { flags } => self.flags_changed(flags),
            RawEvent::MouseDown { button, location } => vec![InputEvent::MousePressed(
                self.translate_location(location, surface_height),
                self.translate_button(button),
            )],
            RawEvent::MouseUp { button, location } => vec![InputEvent::MouseReleased(
                self.translate_location(location, surface_height),
                self.translate_button(button),
            )],
            RawEvent::MouseMoved { location } => vec![InputEvent::MouseMoved(
                self.translate_location(location, surface_height),
            )],
            RawEvent::MouseDragged { button, location } => vec![InputEvent::MouseDragged(
                self.translate_location(location, surface_height),
                self.translate_button(button),
            )],
            RawEvent::MouseEntered => vec![InputEvent::MouseEntered],
            RawEvent::MouseExited => vec![InputEvent::MouseExited],
            RawEvent::Resized { .. } | RawEvent::TransitionFinished | RawEvent::CloseRequested => {
                Vec::new()
            }
        }
    }

    fn flags_changed(&mut self, flags: u64) -> Vec<InputEvent> {
        let new = Modifiers::from_bits_truncate(flags);
        let changed = new ^ self.modifiers;
        self.modifiers = new;

        if !changed.is_empty() {
            debug!("Modifiers changed: {:?}", new);
        }

        MODIFIER_KEYS
            .iter()
            .filter(|(flag, _)| changed.contains(*flag))
            .map(|(flag, key)| {
                if new.contains(*flag) {
                    InputEvent::KeyPressed(Key::Named(*key))
                } else {
                    InputEvent::KeyReleased(Key::Named(*key))
                }
            })
            .collect()
    }
}
