//! Application callbacks
//!
//! A [`SurfaceHandler`] is the sketch: it receives lifecycle and input
//! callbacks from its surface. Every callback gets a [`Ctx`] with a snapshot
//! of the surface and a way to request changes. Requests are applied in order
//! once the callback returns.

use crate::backend::ScreenId;
use crate::context::GlContext;
use crate::geometry::{Point, Rect, Size};
use crate::input::{Key, MouseButton};

/// Immutable snapshot of a surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceState {
    /// Drawable width in pixels
    pub width: f64,
    /// Drawable height in pixels
    pub height: f64,
    /// Last pointer x, top-left origin
    pub mouse_x: f64,
    /// Last pointer y, top-left origin
    pub mouse_y: f64,
    /// Completed frames
    pub frame_count: u64,
    /// Measured frames per second
    pub frame_rate: f64,
    /// Target frames per second
    pub target_frame_rate: f64,
    /// Seconds between the previous two updates
    pub last_frame_time: f64,
    /// Area drawn into (the whole drawable unless keeping an aspect ratio)
    pub viewport: Rect,
    pub fullscreen: bool,
    pub translucent: bool,
    pub display_link: bool,
    pub initialised: bool,
}

impl SurfaceState {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn mouse(&self) -> Point {
        Point::new(self.mouse_x, self.mouse_y)
    }
}

/// A change requested by the application
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Request {
    SetFrameRate(f64),
    SetFullscreen(bool),
    ToggleFullscreen,
    FullscreenTo(ScreenId),
    EnableDisplayLink(bool),
    EnableWindowEvents(bool),
    SetTranslucent(bool),
    SetKeepAspect(Option<f64>),
    Exit,
}

/// Per-callback view of the surface
pub struct Ctx<'a> {
    state: SurfaceState,
    requests: &'a mut Vec<Request>,
}

impl<'a> Ctx<'a> {
    pub(crate) fn new(state: SurfaceState, requests: &'a mut Vec<Request>) -> Self {
        Self { state, requests }
    }

    /// Surface state when the callback started
    pub fn state(&self) -> &SurfaceState {
        &self.state
    }

    pub fn width(&self) -> f64 {
        self.state.width
    }

    pub fn height(&self) -> f64 {
        self.state.height
    }

    pub fn frame_count(&self) -> u64 {
        self.state.frame_count
    }

    /// Queue a request
    pub fn request(&mut self, request: Request) {
        self.requests.push(request);
    }

    pub fn set_frame_rate(&mut self, rate: f64) {
        self.request(Request::SetFrameRate(rate));
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        self.request(Request::SetFullscreen(fullscreen));
    }

    pub fn toggle_fullscreen(&mut self) {
        self.request(Request::ToggleFullscreen);
    }

    pub fn set_fullscreen_to(&mut self, screen: ScreenId) {
        self.request(Request::FullscreenTo(screen));
    }

    pub fn enable_display_link(&mut self, enabled: bool) {
        self.request(Request::EnableDisplayLink(enabled));
    }

    pub fn enable_window_events(&mut self, enabled: bool) {
        self.request(Request::EnableWindowEvents(enabled));
    }

    pub fn set_translucent(&mut self, translucent: bool) {
        self.request(Request::SetTranslucent(translucent));
    }

    pub fn set_keep_aspect(&mut self, ratio: Option<f64>) {
        self.request(Request::SetKeepAspect(ratio));
    }

    /// Ask the surface to exit after this callback
    pub fn exit(&mut self) {
        self.request(Request::Exit);
    }
}

/// Application logic driven by a surface
///
/// `setup` runs once before the first `update`; each frame runs `update` then
/// `draw` with the rendering context current. Input callbacks run as events
/// arrive, in arrival order, also with the context current. `exit` runs once
/// during teardown.
#[allow(unused_variables)]
pub trait SurfaceHandler {
    fn setup(&mut self, ctx: &mut Ctx<'_>) {}

    fn update(&mut self, ctx: &mut Ctx<'_>) {}

    fn draw(&mut self, ctx: &mut Ctx<'_>, gl: &mut dyn GlContext) {}

    fn exit(&mut self) {}

    fn key_pressed(&mut self, ctx: &mut Ctx<'_>, key: Key) {}

    fn key_released(&mut self, ctx: &mut Ctx<'_>, key: Key) {}

    fn mouse_moved(&mut self, ctx: &mut Ctx<'_>, position: Point) {}

    fn mouse_dragged(&mut self, ctx: &mut Ctx<'_>, position: Point, button: MouseButton) {}

    fn mouse_pressed(&mut self, ctx: &mut Ctx<'_>, position: Point, button: MouseButton) {}

    fn mouse_released(&mut self, ctx: &mut Ctx<'_>, position: Point, button: MouseButton) {}

    fn mouse_entered(&mut self, ctx: &mut Ctx<'_>) {}

    fn mouse_exited(&mut self, ctx: &mut Ctx<'_>) {}

    fn window_resized(&mut self, ctx: &mut Ctx<'_>, size: Size) {}
}
