//! Cocoa backend for macOS
//!
//! This module provides the macOS implementation of the backend traits:
//! - NSApplication setup and menu bar
//! - NSWindow hosting the drawable, plus borderless fullscreen windows
//! - An NSView subclass collecting input, and NSEvent monitors
//! - NSOpenGLContext as the rendering context

pub mod app;
pub mod context;
pub mod input;
pub mod view;
pub mod window;

pub use app::CocoaApp;
pub use context::CocoaGlContext;
pub use view::GlView;
pub use window::CocoaHost;
