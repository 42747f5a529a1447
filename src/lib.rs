//! glsurface - an OpenGL-backed windowing surface for creative coding
//!
//! A [`Surface`] hosts a drawable in a native window, keeps a rendering
//! context current while the application's [`SurfaceHandler`] runs, and drives
//! it through setup, update/draw per frame and exit. Frames are paced by a
//! timer or by the display refresh, input is normalized and forwarded as it
//! arrives, and the drawable can be swapped into a fullscreen window without
//! recreating its context.
//!
//! # Architecture
//!
//! - **Surface**: lifecycle, pacing, fullscreen state, input forwarding
//! - **Backend traits**: window host, rendering context, refresh clock
//! - **Event loop**: calloop timer and display-link channel driving frames
//! - **Headless backend**: in-memory host and context, usable anywhere
//! - **Cocoa backend**: NSWindow/NSOpenGLContext on macOS
//!
//! # Example
//!
//! ```no_run
//! use glsurface::backend::{EventLoop, HeadlessContext, HeadlessHost};
//! use glsurface::{SharedContext, Surface, SurfaceConfig, SurfaceHandler};
//!
//! struct Sketch;
//! impl SurfaceHandler for Sketch {}
//!
//! let config = SurfaceConfig::default();
//! let mut event_loop =
//!     EventLoop::<Surface<HeadlessHost, HeadlessContext, Sketch>>::new().unwrap();
//! let mut surface = Surface::new(
//!     HeadlessHost::new(config.size),
//!     SharedContext::new(HeadlessContext::new()),
//!     Box::new(event_loop.clock()),
//!     Sketch,
//!     &config,
//! )
//! .unwrap();
//! event_loop.run(&mut surface).unwrap();
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod geometry;
pub mod handler;
pub mod input;
pub mod surface;

pub use config::SurfaceConfig;
pub use context::{ContextGuard, DrawableHandle, GlContext, SharedContext};
pub use error::SurfaceError;
pub use geometry::{Point, Rect, Size};
pub use handler::{Ctx, Request, SurfaceHandler, SurfaceState};
pub use surface::Surface;
