//! Backend module
//!
//! This module contains the services a surface composes:
//! - [`WindowHost`]: the native window system (window, screens, events)
//! - [`RefreshClock`]: the timer or display link driving frames
//! - Event loop integration with calloop
//! - A headless backend usable anywhere, and a Cocoa backend for macOS
//!
//! The rendering context trait lives in [`crate::context`].

#[cfg(target_os = "macos")]
pub mod cocoa;
pub mod display_link;
pub mod event_loop;
pub mod headless;

use std::time::Duration;

use crate::context::DrawableHandle;
use crate::error::{ClockError, HostError};
use crate::geometry::{Rect, Size};
use crate::input::RawEvent;

#[cfg(target_os = "macos")]
pub use cocoa::{CocoaApp, CocoaGlContext, CocoaHost};
pub use display_link::{DisplayLink, TickGate};
pub use event_loop::{CalloopClock, EventLoop, FrameTarget};
pub use headless::{HeadlessContext, HeadlessHost, ManualClock};

/// Opaque reference to a native window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowRef(pub u64);

/// Opaque reference to a display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScreenId(pub u64);

/// Opaque reference to an installed event monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitorId(pub u64);

/// The pair of monitors installed while window-event capture is enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorHandles {
    /// Receives events delivered to other applications
    pub global: MonitorId,
    /// Receives events delivered to this application
    pub local: MonitorId,
}

/// A display attached to the host
#[derive(Debug, Clone, PartialEq)]
pub struct Screen {
    pub id: ScreenId,
    /// Frame in points
    pub frame: Rect,
    /// Pixels per point
    pub scale: f64,
    /// Refresh rate in Hz, when the display reports one
    pub refresh_rate: Option<f64>,
}

impl Screen {
    /// Frame size in pixels
    pub fn pixel_size(&self) -> Size {
        Size::new(
            self.frame.size.width * self.scale,
            self.frame.size.height * self.scale,
        )
    }
}

/// The native window system hosting a surface's drawable
pub trait WindowHost {
    /// The window currently presenting the drawable
    fn current_window(&self) -> WindowRef;

    /// The screen the current window is on
    fn current_screen(&self) -> ScreenId;

    /// Attached screens
    fn screens(&self) -> Vec<Screen>;

    /// Current drawable size in pixels
    fn drawable_size(&self) -> Size;

    /// The drawable the surface's context renders into
    fn drawable(&self) -> DrawableHandle;

    /// Next pending event from the window system, without blocking
    fn next_event(&mut self) -> Option<RawEvent>;

    /// Move the drawable into an undecorated window covering `screen`
    ///
    /// Completion is reported with [`RawEvent::TransitionFinished`].
    fn enter_fullscreen(&mut self, screen: ScreenId) -> Result<WindowRef, HostError>;

    /// Move the drawable back into `original` and close `fullscreen`
    ///
    /// Completion is reported with [`RawEvent::TransitionFinished`].
    fn leave_fullscreen(
        &mut self,
        fullscreen: WindowRef,
        original: WindowRef,
    ) -> Result<(), HostError>;

    /// Install global and local input monitors
    fn install_monitors(&mut self) -> Result<MonitorHandles, HostError>;

    /// Remove monitors returned by [`WindowHost::install_monitors`]
    fn remove_monitors(&mut self, monitors: MonitorHandles);

    /// Make the window background transparent
    fn set_translucent(&mut self, translucent: bool);

    /// Constrain interactive resizing to a width/height ratio
    fn set_content_aspect(&mut self, ratio: Option<f64>);
}

/// Longest tick period a clock schedules
///
/// Rates slower than one tick a day are clamped so deadlines stay
/// representable as an `Instant`.
pub const MAX_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Tick period for `rate` ticks per second, clamped to [`MAX_PERIOD`]
pub fn period_for_rate(rate: f64) -> Duration {
    Duration::try_from_secs_f64(1.0 / rate)
        .unwrap_or(MAX_PERIOD)
        .min(MAX_PERIOD)
}

/// Which source drives the frame cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Timer,
    DisplayLink,
}

/// Source of frame ticks
///
/// Implementations keep the timer and the display link mutually exclusive:
/// starting either stops whichever was running.
pub trait RefreshClock {
    /// Tick at a fixed interval
    fn start_timer(&mut self, interval: Duration) -> Result<(), ClockError>;

    /// Tick with the display refresh
    fn start_display_link(&mut self, refresh_rate: f64) -> Result<(), ClockError>;

    /// Change the timer interval, effective from the next tick
    fn set_interval(&mut self, interval: Duration);

    /// Stop ticking; no-op when already stopped
    fn stop(&mut self);

    /// The active driver, if any
    fn driver(&self) -> Option<Driver>;
}
