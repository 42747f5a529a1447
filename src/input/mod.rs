//! Input handling
//!
//! This module contains:
//! - Raw host events and normalized input events
//! - Translation from native key codes, buttons and coordinates

pub mod event;
pub mod translator;

pub use event::{InputEvent, Key, Modifiers, MouseButton, NamedKey, RawEvent};
pub use translator::InputTranslator;
