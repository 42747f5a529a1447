//! Headless backend
//!
//! An in-memory window host, a recording rendering context and a manually
//! driven clock. Used by the tests and by the demo binary on systems without
//! a Cocoa window server.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use log::debug;

use crate::backend::{
    Driver, MonitorHandles, MonitorId, RefreshClock, Screen, ScreenId, WindowHost, WindowRef,
};
use crate::context::{DrawableHandle, GlContext};
use crate::error::{ClockError, ContextError, HostError};
use crate::geometry::{Rect, Size};
use crate::input::RawEvent;

/// Source of unique headless drawables
static NEXT_DRAWABLE: AtomicUsize = AtomicUsize::new(1);

/// In-memory window host
#[derive(Debug)]
pub struct HeadlessHost {
    next_id: u64,
    /// Stays with the host across fullscreen swaps, like a view moving windows
    drawable: DrawableHandle,
    /// The windowed-mode window
    window: WindowRef,
    /// Drawable size of the windowed-mode window
    windowed_size: Size,
    screens: Vec<Screen>,
    current_screen: ScreenId,
    /// Fullscreen window and the screen it covers
    fullscreen: Option<(WindowRef, ScreenId)>,
    /// Fullscreen windows that have been closed
    closed_windows: Vec<WindowRef>,
    events: VecDeque<RawEvent>,
    monitors: HashSet<MonitorId>,
    translucent: bool,
    content_aspect: Option<f64>,
}

impl HeadlessHost {
    /// Create a host with one 1920x1080 screen at 60 Hz
    pub fn new(size: Size) -> Self {
        let screen = Screen {
            id: ScreenId(1),
            frame: Rect::new(0.0, 0.0, 1920.0, 1080.0),
            scale: 1.0,
            refresh_rate: Some(60.0),
        };
        Self::with_screens(size, vec![screen])
    }

    /// Create a host with the given screens; the window starts on the first
    pub fn with_screens(size: Size, screens: Vec<Screen>) -> Self {
        let current_screen = screens.first().map(|s| s.id).unwrap_or(ScreenId(0));
        Self {
            next_id: 2,
            drawable: DrawableHandle(NEXT_DRAWABLE.fetch_add(1, Ordering::Relaxed)),
            window: WindowRef(1),
            windowed_size: size,
            screens,
            current_screen,
            fullscreen: None,
            closed_windows: Vec::new(),
            events: VecDeque::new(),
            monitors: HashSet::new(),
            translucent: false,
            content_aspect: None,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn screen(&self, id: ScreenId) -> Option<&Screen> {
        self.screens.iter().find(|s| s.id == id)
    }

    /// Queue an event as if the window system delivered it
    pub fn push_event(&mut self, event: RawEvent) {
        self.events.push_back(event);
    }

    /// Resize the windowed-mode window and queue the notification
    pub fn resize(&mut self, size: Size) {
        self.windowed_size = size;
        if self.fullscreen.is_none() {
            self.events.push_back(RawEvent::Resized { size });
        }
    }

    /// Number of queued events
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Number of installed monitors
    pub fn installed_monitors(&self) -> usize {
        self.monitors.len()
    }

    /// The open fullscreen window, if any
    pub fn fullscreen_window(&self) -> Option<WindowRef> {
        self.fullscreen.map(|(window, _)| window)
    }

    /// Fullscreen windows closed so far
    pub fn closed_windows(&self) -> &[WindowRef] {
        &self.closed_windows
    }

    /// Whether the window background is transparent
    pub fn is_translucent(&self) -> bool {
        self.translucent
    }

    /// The resize constraint, if any
    pub fn content_aspect(&self) -> Option<f64> {
        self.content_aspect
    }
}

impl WindowHost for HeadlessHost {
    fn drawable(&self) -> DrawableHandle {
        self.drawable
    }

    fn current_window(&self) -> WindowRef {
        self.fullscreen_window().unwrap_or(self.window)
    }

    fn current_screen(&self) -> ScreenId {
        self.current_screen
    }

    fn screens(&self) -> Vec<Screen> {
        self.screens.clone()
    }

    fn drawable_size(&self) -> Size {
        match self.fullscreen {
            Some((_, screen)) => self
                .screen(screen)
                .map(Screen::pixel_size)
                .unwrap_or(self.windowed_size),
            None => self.windowed_size,
        }
    }

    fn next_event(&mut self) -> Option<RawEvent> {
        self.events.pop_front()
    }

    fn enter_fullscreen(&mut self, screen: ScreenId) -> Result<WindowRef, HostError> {
        let size = self
            .screen(screen)
            .map(Screen::pixel_size)
            .ok_or(HostError::UnknownScreen(screen.0))?;
        if self.fullscreen.is_some() {
            return Err(HostError::WindowCreation(
                "a fullscreen window is already open".to_string(),
            ));
        }

        let window = WindowRef(self.next_id());
        self.fullscreen = Some((window, screen));
        self.current_screen = screen;
        self.events.push_back(RawEvent::Resized { size });
        self.events.push_back(RawEvent::TransitionFinished);

        debug!("Headless fullscreen window {:?} on {:?}", window, screen);
        Ok(window)
    }

    fn leave_fullscreen(
        &mut self,
        fullscreen: WindowRef,
        original: WindowRef,
    ) -> Result<(), HostError> {
        if original != self.window {
            return Err(HostError::UnknownWindow(original.0));
        }
        match self.fullscreen {
            Some((window, _)) if window == fullscreen => {}
            _ => return Err(HostError::UnknownWindow(fullscreen.0)),
        }

        self.fullscreen = None;
        self.closed_windows.push(fullscreen);
        self.events.push_back(RawEvent::Resized {
            size: self.windowed_size,
        });
        self.events.push_back(RawEvent::TransitionFinished);

        debug!("Headless fullscreen window {:?} closed", fullscreen);
        Ok(())
    }

    fn install_monitors(&mut self) -> Result<MonitorHandles, HostError> {
        let handles = MonitorHandles {
            global: MonitorId(self.next_id()),
            local: MonitorId(self.next_id()),
        };
        self.monitors.insert(handles.global);
        self.monitors.insert(handles.local);
        Ok(handles)
    }

    fn remove_monitors(&mut self, monitors: MonitorHandles) {
        self.monitors.remove(&monitors.global);
        self.monitors.remove(&monitors.local);
    }

    fn set_translucent(&mut self, translucent: bool) {
        self.translucent = translucent;
    }

    fn set_content_aspect(&mut self, ratio: Option<f64>) {
        self.content_aspect = ratio;
    }
}

/// Call counts recorded by [`HeadlessContext`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextStats {
    pub make_current: usize,
    pub setup_screen: usize,
    pub flushes: usize,
    pub surface_changes: usize,
    pub releases: usize,
    /// Binds that switched to a different drawable
    pub rebinds: usize,
}

/// Rendering context that records what it is asked to do
#[derive(Debug)]
pub struct HeadlessContext {
    stats: ContextStats,
    drawable: Option<DrawableHandle>,
    last_viewport: Option<Rect>,
    opaque: bool,
    vsync: bool,
    released: bool,
    fail_make_current: bool,
}

impl HeadlessContext {
    /// Create a working context
    pub fn new() -> Self {
        Self {
            stats: ContextStats::default(),
            drawable: None,
            last_viewport: None,
            opaque: true,
            vsync: false,
            released: false,
            fail_make_current: false,
        }
    }

    /// Create a context that can never be made current
    pub fn failing() -> Self {
        Self {
            fail_make_current: true,
            ..Self::new()
        }
    }

    pub fn stats(&self) -> ContextStats {
        self.stats
    }

    /// The drawable currently rendered into
    pub fn drawable(&self) -> Option<DrawableHandle> {
        self.drawable
    }

    /// Viewport passed to the last screen setup
    pub fn last_viewport(&self) -> Option<Rect> {
        self.last_viewport
    }

    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    pub fn vsync(&self) -> bool {
        self.vsync
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Default for HeadlessContext {
    fn default() -> Self {
        Self::new()
    }
}

impl GlContext for HeadlessContext {
    fn bind_drawable(&mut self, drawable: DrawableHandle) -> Result<(), ContextError> {
        if self.released {
            return Err(ContextError::Released);
        }
        if self.drawable != Some(drawable) {
            if self.drawable.is_some() {
                self.stats.rebinds += 1;
            }
            self.drawable = Some(drawable);
        }
        Ok(())
    }

    fn make_current(&mut self) -> Result<(), ContextError> {
        if self.fail_make_current {
            return Err(ContextError::MakeCurrent);
        }
        if self.released {
            return Err(ContextError::Released);
        }
        self.stats.make_current += 1;
        Ok(())
    }

    fn setup_screen(&mut self, viewport: Rect) {
        self.stats.setup_screen += 1;
        self.last_viewport = Some(viewport);
    }

    fn flush(&mut self) {
        self.stats.flushes += 1;
    }

    fn surface_changed(&mut self) {
        self.stats.surface_changes += 1;
    }

    fn set_opaque(&mut self, opaque: bool) {
        self.opaque = opaque;
    }

    fn set_vsync(&mut self, enabled: bool) {
        self.vsync = enabled;
    }

    fn release(&mut self) {
        self.stats.releases += 1;
        self.released = true;
    }
}

/// State observed through a [`ManualClock`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManualClockState {
    pub driver: Option<Driver>,
    pub interval: Duration,
    pub refresh_rate: Option<f64>,
    pub starts: usize,
    pub stops: usize,
}

/// Clock that never ticks on its own
///
/// For embedding a surface in a loop the caller owns: the caller invokes
/// [`crate::Surface::frame`] itself. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    state: Rc<RefCell<ManualClockState>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the clock state
    pub fn state(&self) -> ManualClockState {
        self.state.borrow().clone()
    }
}

impl RefreshClock for ManualClock {
    fn start_timer(&mut self, interval: Duration) -> Result<(), ClockError> {
        let mut state = self.state.borrow_mut();
        state.driver = Some(Driver::Timer);
        state.interval = interval;
        state.refresh_rate = None;
        state.starts += 1;
        Ok(())
    }

    fn start_display_link(&mut self, refresh_rate: f64) -> Result<(), ClockError> {
        if !refresh_rate.is_finite() || refresh_rate <= 0.0 {
            return Err(ClockError::InvalidRefreshRate(refresh_rate));
        }
        let mut state = self.state.borrow_mut();
        state.driver = Some(Driver::DisplayLink);
        state.refresh_rate = Some(refresh_rate);
        state.starts += 1;
        Ok(())
    }

    fn set_interval(&mut self, interval: Duration) {
        self.state.borrow_mut().interval = interval;
    }

    fn stop(&mut self) {
        let mut state = self.state.borrow_mut();
        if state.driver.take().is_some() {
            state.stops += 1;
        }
    }

    fn driver(&self) -> Option<Driver> {
        self.state.borrow().driver
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fullscreen_round_trip() {
        let mut host = HeadlessHost::new(Size::new(640.0, 480.0));
        let original = host.current_window();

        let fullscreen = host.enter_fullscreen(ScreenId(1)).unwrap();
        assert_ne!(fullscreen, original);
        assert_eq!(host.current_window(), fullscreen);
        assert_eq!(host.drawable_size(), Size::new(1920.0, 1080.0));

        host.leave_fullscreen(fullscreen, original).unwrap();
        assert_eq!(host.current_window(), original);
        assert_eq!(host.drawable_size(), Size::new(640.0, 480.0));
        assert_eq!(host.closed_windows(), &[fullscreen]);
        assert_eq!(host.pending_events(), 4);
    }

    #[test]
    fn test_unknown_screen() {
        let mut host = HeadlessHost::new(Size::new(640.0, 480.0));
        assert_eq!(
            host.enter_fullscreen(ScreenId(9)),
            Err(HostError::UnknownScreen(9))
        );
    }

    #[test]
    fn test_monitors() {
        let mut host = HeadlessHost::new(Size::new(640.0, 480.0));
        let handles = host.install_monitors().unwrap();
        assert_ne!(handles.global, handles.local);
        assert_eq!(host.installed_monitors(), 2);

        host.remove_monitors(handles);
        assert_eq!(host.installed_monitors(), 0);
    }

    #[test]
    fn test_resize_while_fullscreen_is_deferred() {
        let mut host = HeadlessHost::new(Size::new(640.0, 480.0));
        let original = host.current_window();
        let fullscreen = host.enter_fullscreen(ScreenId(1)).unwrap();
        while host.next_event().is_some() {}

        host.resize(Size::new(800.0, 600.0));
        assert_eq!(host.pending_events(), 0);

        host.leave_fullscreen(fullscreen, original).unwrap();
        assert_eq!(
            host.next_event(),
            Some(RawEvent::Resized {
                size: Size::new(800.0, 600.0)
            })
        );
    }

    #[test]
    fn test_manual_clock() {
        let observer = ManualClock::new();
        let mut clock = observer.clone();

        clock.start_timer(Duration::from_millis(10)).unwrap();
        clock.start_display_link(120.0).unwrap();
        assert_eq!(observer.state().driver, Some(Driver::DisplayLink));

        clock.stop();
        clock.stop();
        let state = observer.state();
        assert_eq!(state.driver, None);
        assert_eq!(state.starts, 2);
        assert_eq!(state.stops, 1);
    }

    #[test]
    fn test_failing_context() {
        let mut context = HeadlessContext::failing();
        assert_eq!(context.make_current(), Err(ContextError::MakeCurrent));
    }
}
