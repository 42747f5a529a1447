//! The rendering surface
//!
//! A [`Surface`] ties a window host, a rendering context, a refresh clock and
//! an application handler together. It owns the frame cycle
//! (setup, then update and draw per tick, then exit), translates and forwards
//! input, paces frames and swaps windows for fullscreen presentation.

pub mod aspect;
pub mod fullscreen;
pub mod pacing;

use std::time::Instant;

use log::{debug, error, info, trace, warn};

use crate::backend::{
    Driver, FrameTarget, MonitorHandles, RefreshClock, ScreenId, WindowHost,
};
use crate::config::SurfaceConfig;
use crate::context::{ContextGuard, DrawableHandle, GlContext, SharedContext};
use crate::error::SurfaceError;
use crate::geometry::{Point, Rect, Size};
use crate::handler::{Ctx, Request, SurfaceHandler, SurfaceState};
use crate::input::{InputEvent, InputTranslator, RawEvent};

pub use fullscreen::{FullscreenState, FullscreenWindows, Transition};
pub use pacing::FramePacer;

/// Refresh rate assumed when the screen does not report one
pub const DEFAULT_REFRESH_RATE: f64 = 60.0;

/// A windowed GL-backed rendering surface
pub struct Surface<W: WindowHost, C: GlContext, H: SurfaceHandler> {
    /// Native window system
    host: W,
    /// Rendering context, possibly shared with other surfaces
    context: SharedContext<C>,
    /// Timer or display link driving frames
    clock: Box<dyn RefreshClock>,
    /// Application callbacks
    handler: H,
    translator: InputTranslator,
    pacer: FramePacer,
    fullscreen: FullscreenState,
    /// Installed while window-event capture is enabled
    monitors: Option<MonitorHandles>,
    /// Install monitors during setup
    capture_on_setup: bool,
    /// Drawable size in pixels
    size: Size,
    /// Pointer position, top-left origin
    mouse: Point,
    keep_aspect: Option<f64>,
    translucent: bool,
    enable_setup_screen: bool,
    use_display_link: bool,
    initialised: bool,
    exited: bool,
    /// Requests queued by the handler during a callback
    requests: Vec<Request>,
    /// Error that ended the surface from inside the event loop
    failure: Option<SurfaceError>,
}

impl<W: WindowHost, C: GlContext, H: SurfaceHandler> Surface<W, C, H> {
    /// Create a surface; nothing runs until [`Surface::setup`] or the first tick
    pub fn new(
        mut host: W,
        context: SharedContext<C>,
        clock: Box<dyn RefreshClock>,
        handler: H,
        config: &SurfaceConfig,
    ) -> Result<Self, SurfaceError> {
        let pacer = FramePacer::new(config.frame_rate)?;
        if let Some(ratio) = config.keep_aspect {
            validate_aspect(ratio)?;
        }

        context.lock()?.set_opaque(!config.translucent);
        host.set_translucent(config.translucent);
        host.set_content_aspect(config.keep_aspect);

        debug!(
            "Created surface: {} fps, display link {}, shared context {}",
            config.frame_rate,
            config.use_display_link,
            context.is_shared()
        );

        Ok(Self {
            host,
            context,
            clock,
            handler,
            translator: InputTranslator::new(),
            pacer,
            fullscreen: FullscreenState::Windowed,
            monitors: None,
            capture_on_setup: config.window_events,
            size: Size::default(),
            mouse: Point::default(),
            keep_aspect: config.keep_aspect,
            translucent: config.translucent,
            enable_setup_screen: config.enable_setup_screen,
            use_display_link: config.use_display_link,
            initialised: false,
            exited: false,
            requests: Vec::new(),
            failure: None,
        })
    }

    /// One-time initialisation; repeated calls are no-ops
    pub fn setup(&mut self) -> Result<(), SurfaceError> {
        self.ensure_live()?;
        if self.initialised {
            debug!("Surface already set up");
            return Ok(());
        }

        info!("Setting up surface");
        let size = self.host.drawable_size();
        if size.is_valid() {
            self.size = size;
        } else {
            warn!("Host reported drawable size {}x{}", size.width, size.height);
        }

        {
            let mut context = self.context.lock()?;
            context.bind_drawable(self.host.drawable())?;
            context.make_current()?;
            context.set_vsync(self.use_display_link);

            let state = self.state();
            let mut ctx = Ctx::new(state, &mut self.requests);
            self.handler.setup(&mut ctx);
            context.unlock();
        }
        self.initialised = true;

        if self.capture_on_setup {
            self.enable_window_events(true)?;
        }
        self.start_driver()?;
        self.apply_requests();

        info!(
            "Surface ready: {}x{}, driver {:?}",
            self.size.width,
            self.size.height,
            self.clock.driver()
        );
        Ok(())
    }

    /// Run one update/draw pair
    ///
    /// Runs setup first if it has not run yet. Ticks after exit are ignored.
    pub fn frame(&mut self, now: Instant) -> Result<(), SurfaceError> {
        if self.exited {
            trace!("Tick after exit ignored");
            return Ok(());
        }
        if !self.initialised {
            self.setup()?;
        }

        self.pacer.begin_frame(now);
        let viewport = self.viewport();
        {
            let mut context = self.context.lock()?;
            context.bind_drawable(self.host.drawable())?;
            context.make_current()?;

            let state = self.state();
            let mut ctx = Ctx::new(state, &mut self.requests);
            self.handler.update(&mut ctx);

            if self.enable_setup_screen {
                context.setup_screen(viewport);
            }
            self.handler.draw(&mut ctx, &mut *context);
            context.flush();
        }
        self.pacer.end_frame();

        self.apply_requests();
        Ok(())
    }

    /// Release the clock, monitors, fullscreen window and context
    ///
    /// Safe to call more than once; later calls do nothing.
    pub fn exit(&mut self) -> Result<(), SurfaceError> {
        if self.exited {
            return Ok(());
        }
        info!("Surface exiting after {} frames", self.pacer.frame_count());
        self.exited = true;

        self.clock.stop();

        if let Some(monitors) = self.monitors.take() {
            self.host.remove_monitors(monitors);
        }

        if let Some((windows, close)) = self.fullscreen.take() {
            if close {
                if let Err(e) = self
                    .host
                    .leave_fullscreen(windows.fullscreen, windows.original)
                {
                    warn!("Failed to close fullscreen window: {}", e);
                }
            }
            debug!("Released fullscreen window {:?}", windows.fullscreen);
        }

        if self.initialised {
            let mut context = self.context.lock()?;
            let current = context
                .bind_drawable(self.host.drawable())
                .and_then(|()| context.make_current());
            if let Err(e) = current {
                warn!("Exiting without a current context: {}", e);
            }
            self.handler.exit();
            context.unlock();
        }

        self.requests.clear();
        if self.context.detach()? {
            debug!("Rendering context released");
        }
        Ok(())
    }

    /// Drain and handle every pending host event
    pub fn pump_events(&mut self) {
        while !self.exited {
            let Some(event) = self.host.next_event() else {
                break;
            };
            if let Err(e) = self.handle_raw_event(event) {
                warn!("Failed to handle event: {}", e);
            }
        }
    }

    /// Handle one event from the window host
    pub fn handle_raw_event(&mut self, event: RawEvent) -> Result<(), SurfaceError> {
        if self.exited {
            return Ok(());
        }
        match event {
            RawEvent::Resized { size } => self.window_resized(size),
            RawEvent::TransitionFinished => {
                self.finish_transition();
                Ok(())
            }
            RawEvent::CloseRequested => self.exit(),
            other => {
                for input in self.translator.translate(&other, self.size.height) {
                    self.handle_input(input)?;
                }
                Ok(())
            }
        }
    }

    /// Forward a normalized input event to the handler
    ///
    /// The pointer position is always recorded; the handler only sees events
    /// once setup has run.
    pub fn handle_input(&mut self, event: InputEvent) -> Result<(), SurfaceError> {
        if self.exited {
            return Ok(());
        }
        if let Some(position) = event.position() {
            self.mouse = position;
        }
        if !self.initialised {
            trace!("Input before setup not forwarded: {:?}", event);
            return Ok(());
        }

        {
            let context = begin_window_event(&self.context, self.host.drawable())?;
            let state = self.state();
            let mut ctx = Ctx::new(state, &mut self.requests);
            let handler = &mut self.handler;

            match event {
                InputEvent::KeyPressed(key) => handler.key_pressed(&mut ctx, key),
                InputEvent::KeyReleased(key) => handler.key_released(&mut ctx, key),
                InputEvent::MouseMoved(p) => handler.mouse_moved(&mut ctx, p),
                InputEvent::MouseDragged(p, button) => handler.mouse_dragged(&mut ctx, p, button),
                InputEvent::MousePressed(p, button) => handler.mouse_pressed(&mut ctx, p, button),
                InputEvent::MouseReleased(p, button) => {
                    handler.mouse_released(&mut ctx, p, button)
                }
                InputEvent::MouseEntered => handler.mouse_entered(&mut ctx),
                InputEvent::MouseExited => handler.mouse_exited(&mut ctx),
            }
            end_window_event(context);
        }

        self.apply_requests();
        Ok(())
    }

    /// Record a new drawable size and notify the handler
    ///
    /// Non-positive or non-finite sizes are ignored.
    pub fn window_resized(&mut self, size: Size) -> Result<(), SurfaceError> {
        if self.exited {
            return Ok(());
        }
        if !size.is_valid() {
            warn!("Ignoring resize to {}x{}", size.width, size.height);
            return Ok(());
        }

        debug!("Resized to {}x{}", size.width, size.height);
        self.size = size;

        {
            let mut context = begin_window_event(&self.context, self.host.drawable())?;
            context.surface_changed();
            if self.initialised {
                let state = self.state();
                let mut ctx = Ctx::new(state, &mut self.requests);
                self.handler.window_resized(&mut ctx, size);
            }
            end_window_event(context);
        }

        self.apply_requests();
        Ok(())
    }

    /// Lock the context and make it current around a window event
    pub fn begin_window_event(&self) -> Result<ContextGuard<'_, C>, SurfaceError> {
        begin_window_event(&self.context, self.host.drawable())
    }

    /// Release the context locked by [`Surface::begin_window_event`]
    pub fn end_window_event(&self, context: ContextGuard<'_, C>) {
        end_window_event(context);
    }

    /// Set the target frame rate; must be finite and positive
    pub fn set_frame_rate(&mut self, rate: f64) -> Result<(), SurfaceError> {
        self.pacer.set_target(rate)?;
        match self.clock.driver() {
            Some(Driver::Timer) => self.clock.set_interval(self.pacer.interval()),
            Some(Driver::DisplayLink) => {
                debug!("Target {} fps is advisory while the display link drives frames", rate)
            }
            None => {}
        }
        Ok(())
    }

    /// Drive frames from the display refresh (true) or a timer (false)
    pub fn enable_display_link(&mut self, enabled: bool) -> Result<(), SurfaceError> {
        self.ensure_live()?;
        if self.use_display_link == enabled && (!self.initialised || self.clock.driver().is_some())
        {
            return Ok(());
        }

        self.use_display_link = enabled;
        self.context.lock()?.set_vsync(enabled);
        if self.initialised {
            self.start_driver()?;
        }
        Ok(())
    }

    fn start_driver(&mut self) -> Result<(), SurfaceError> {
        if self.use_display_link {
            let rate = self.refresh_rate();
            self.clock.start_display_link(rate)?;
            info!("Display link driving frames at {:.2} Hz", rate);
        } else {
            self.clock.start_timer(self.pacer.interval())?;
            info!("Timer driving frames at {} fps", self.pacer.target());
        }
        Ok(())
    }

    /// Refresh rate of the screen showing the surface
    pub fn refresh_rate(&self) -> f64 {
        let current = self.host.current_screen();
        self.host
            .screens()
            .iter()
            .find(|screen| screen.id == current)
            .and_then(|screen| screen.refresh_rate)
            .filter(|rate| rate.is_finite() && *rate > 0.0)
            .unwrap_or(DEFAULT_REFRESH_RATE)
    }

    /// Present fullscreen on `screen`
    ///
    /// No-op when already fullscreen; rejected while a transition is in flight.
    pub fn set_fullscreen_to(&mut self, screen: ScreenId) -> Result<(), SurfaceError> {
        self.ensure_live()?;
        match self.fullscreen {
            FullscreenState::Windowed => {}
            FullscreenState::Fullscreen(_) => {
                debug!("Already fullscreen");
                return Ok(());
            }
            _ => return Err(SurfaceError::TransitionInProgress),
        }

        let original = self.host.current_window();
        let fullscreen = self.host.enter_fullscreen(screen)?;
        self.fullscreen.begin_enter(FullscreenWindows {
            original,
            fullscreen,
            screen,
            restore_size: self.size,
        })?;
        self.context.lock()?.surface_changed();

        info!("Entering fullscreen on {:?} with window {:?}", screen, fullscreen);
        Ok(())
    }

    /// Restore the original window; no-op when windowed
    pub fn exit_fullscreen(&mut self) -> Result<(), SurfaceError> {
        self.ensure_live()?;
        match self.fullscreen {
            FullscreenState::Windowed => {
                debug!("Already windowed");
                return Ok(());
            }
            FullscreenState::Fullscreen(_) => {}
            _ => return Err(SurfaceError::TransitionInProgress),
        }

        let windows = self.fullscreen.begin_exit()?;
        if let Err(e) = self
            .host
            .leave_fullscreen(windows.fullscreen, windows.original)
        {
            // Still fullscreen
            self.fullscreen = FullscreenState::Fullscreen(windows);
            return Err(e.into());
        }
        self.context.lock()?.surface_changed();

        info!("Leaving fullscreen, restoring window {:?}", windows.original);
        Ok(())
    }

    /// Fullscreen on the current screen (true) or windowed (false)
    pub fn set_fullscreen(&mut self, fullscreen: bool) -> Result<(), SurfaceError> {
        if fullscreen {
            let screen = self.host.current_screen();
            self.set_fullscreen_to(screen)
        } else {
            self.exit_fullscreen()
        }
    }

    /// Switch between windowed and fullscreen presentation
    pub fn toggle_fullscreen(&mut self) -> Result<(), SurfaceError> {
        if self.fullscreen.is_transitioning() {
            return Err(SurfaceError::TransitionInProgress);
        }
        let fullscreen = self.fullscreen.is_fullscreen();
        self.set_fullscreen(!fullscreen)
    }

    fn finish_transition(&mut self) {
        match self.fullscreen.finish() {
            Some(Transition::Entered(windows)) => {
                info!("Fullscreen on {:?}", windows.screen);
            }
            Some(Transition::Exited(windows)) => {
                info!("Windowed in {:?}", windows.original);
            }
            None => warn!("Transition notification with no transition in flight"),
        }
    }

    /// Install (true) or remove (false) the global and local event monitors
    ///
    /// Repeating the current setting does nothing.
    pub fn enable_window_events(&mut self, enabled: bool) -> Result<(), SurfaceError> {
        match (enabled, self.monitors) {
            (true, None) => {
                self.ensure_live()?;
                let monitors = self.host.install_monitors()?;
                debug!("Installed event monitors {:?}", monitors);
                self.monitors = Some(monitors);
            }
            (false, Some(monitors)) => {
                self.host.remove_monitors(monitors);
                self.monitors = None;
                debug!("Removed event monitors {:?}", monitors);
            }
            _ => trace!("Window events already {}", enabled),
        }
        Ok(())
    }

    /// Make the surface and its window non-opaque
    pub fn set_translucent(&mut self, translucent: bool) -> Result<(), SurfaceError> {
        self.ensure_live()?;
        self.context.lock()?.set_opaque(!translucent);
        self.host.set_translucent(translucent);
        self.translucent = translucent;
        Ok(())
    }

    /// Letterbox to a width/height ratio, or fill the drawable with `None`
    pub fn set_keep_aspect(&mut self, ratio: Option<f64>) -> Result<(), SurfaceError> {
        if let Some(ratio) = ratio {
            validate_aspect(ratio)?;
        }
        self.keep_aspect = ratio;
        self.host.set_content_aspect(ratio);
        Ok(())
    }

    /// Area of the drawable used for drawing
    pub fn viewport(&self) -> Rect {
        match self.keep_aspect {
            Some(ratio) => aspect::letterbox(self.size, ratio),
            None => Rect::from_size(self.size),
        }
    }

    fn apply_requests(&mut self) {
        while !self.requests.is_empty() {
            let requests = std::mem::take(&mut self.requests);
            for request in requests {
                if let Err(e) = self.apply(request) {
                    warn!("Request {:?} failed: {}", request, e);
                }
            }
        }
    }

    fn apply(&mut self, request: Request) -> Result<(), SurfaceError> {
        match request {
            Request::SetFrameRate(rate) => self.set_frame_rate(rate),
            Request::SetFullscreen(fullscreen) => self.set_fullscreen(fullscreen),
            Request::ToggleFullscreen => self.toggle_fullscreen(),
            Request::FullscreenTo(screen) => self.set_fullscreen_to(screen),
            Request::EnableDisplayLink(enabled) => self.enable_display_link(enabled),
            Request::EnableWindowEvents(enabled) => self.enable_window_events(enabled),
            Request::SetTranslucent(translucent) => self.set_translucent(translucent),
            Request::SetKeepAspect(ratio) => self.set_keep_aspect(ratio),
            Request::Exit => self.exit(),
        }
    }

    fn ensure_live(&self) -> Result<(), SurfaceError> {
        if self.exited {
            Err(SurfaceError::Exited)
        } else {
            Ok(())
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SurfaceState {
        SurfaceState {
            width: self.size.width,
            height: self.size.height,
            mouse_x: self.mouse.x,
            mouse_y: self.mouse.y,
            frame_count: self.pacer.frame_count(),
            frame_rate: self.pacer.measured(),
            target_frame_rate: self.pacer.target(),
            last_frame_time: self.pacer.last_frame_time().as_secs_f64(),
            viewport: self.viewport(),
            fullscreen: self.fullscreen.is_fullscreen(),
            translucent: self.translucent,
            display_link: self.use_display_link,
            initialised: self.initialised,
        }
    }

    pub fn width(&self) -> f64 {
        self.size.width
    }

    pub fn height(&self) -> f64 {
        self.size.height
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn mouse_x(&self) -> f64 {
        self.mouse.x
    }

    pub fn mouse_y(&self) -> f64 {
        self.mouse.y
    }

    pub fn frame_count(&self) -> u64 {
        self.pacer.frame_count()
    }

    /// Measured frames per second
    pub fn frame_rate(&self) -> f64 {
        self.pacer.measured()
    }

    pub fn target_frame_rate(&self) -> f64 {
        self.pacer.target()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen.is_fullscreen()
    }

    pub fn is_transitioning(&self) -> bool {
        self.fullscreen.is_transitioning()
    }

    pub fn fullscreen_state(&self) -> FullscreenState {
        self.fullscreen
    }

    pub fn is_translucent(&self) -> bool {
        self.translucent
    }

    pub fn is_display_link_enabled(&self) -> bool {
        self.use_display_link
    }

    pub fn window_events_enabled(&self) -> bool {
        self.monitors.is_some()
    }

    pub fn keep_aspect(&self) -> Option<f64> {
        self.keep_aspect
    }

    /// The active frame driver
    pub fn driver(&self) -> Option<Driver> {
        self.clock.driver()
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    pub fn is_exited(&self) -> bool {
        self.exited
    }

    /// Error that stopped the surface while running in an event loop
    pub fn failure(&self) -> Option<&SurfaceError> {
        self.failure.as_ref()
    }

    /// Handle to this surface's rendering context
    pub fn shared_context(&self) -> &SharedContext<C> {
        &self.context
    }

    pub fn host(&self) -> &W {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut W {
        &mut self.host
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}

fn begin_window_event<C: GlContext>(
    context: &SharedContext<C>,
    drawable: DrawableHandle,
) -> Result<ContextGuard<'_, C>, SurfaceError> {
    let mut guard = context.lock()?;
    guard.bind_drawable(drawable)?;
    guard.make_current()?;
    Ok(guard)
}

fn end_window_event<C: GlContext>(context: ContextGuard<'_, C>) {
    context.unlock();
}

fn validate_aspect(ratio: f64) -> Result<(), SurfaceError> {
    if ratio.is_finite() && ratio > 0.0 {
        Ok(())
    } else {
        Err(SurfaceError::InvalidAspect(ratio))
    }
}

impl<W: WindowHost, C: GlContext, H: SurfaceHandler> FrameTarget for Surface<W, C, H> {
    fn on_tick(&mut self, now: Instant) {
        let setting_up = !self.initialised;
        if let Err(e) = self.frame(now) {
            if setting_up {
                error!("Surface setup failed: {}", e);
                self.failure = Some(e);
                if let Err(e) = self.exit() {
                    error!("Teardown after failed setup: {}", e);
                }
            } else {
                error!("Frame failed: {}", e);
            }
        }
    }

    fn pump_events(&mut self) {
        Surface::pump_events(self);
    }

    fn is_finished(&self) -> bool {
        self.exited
    }
}

impl<W: WindowHost, C: GlContext, H: SurfaceHandler> Drop for Surface<W, C, H> {
    fn drop(&mut self) {
        if let Err(e) = self.exit() {
            warn!("Surface teardown failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::backend::{HeadlessContext, HeadlessHost, ManualClock, Screen, MAX_PERIOD};
    use crate::error::{ContextError, HostError};
    use crate::input::{Key, MouseButton, NamedKey};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Setup,
        Update(SurfaceState),
        Draw(SurfaceState),
        Exit,
        KeyPressed(Key),
        KeyReleased(Key),
        Moved(Point),
        Dragged(Point, MouseButton),
        Pressed(Point, MouseButton),
        Released(Point, MouseButton),
        Entered,
        Exited,
        Resized(Size),
    }

    impl Call {
        fn name(&self) -> &'static str {
            match self {
                Call::Setup => "setup",
                Call::Update(_) => "update",
                Call::Draw(_) => "draw",
                Call::Exit => "exit",
                Call::KeyPressed(_) => "key_pressed",
                Call::KeyReleased(_) => "key_released",
                Call::Moved(_) => "mouse_moved",
                Call::Dragged(..) => "mouse_dragged",
                Call::Pressed(..) => "mouse_pressed",
                Call::Released(..) => "mouse_released",
                Call::Entered => "mouse_entered",
                Call::Exited => "mouse_exited",
                Call::Resized(_) => "window_resized",
            }
        }
    }

    /// Records every callback; issues queued requests from update and key presses
    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
        on_update: Vec<Request>,
        on_key: Vec<Request>,
    }

    impl Recorder {
        fn names(&self) -> Vec<&'static str> {
            self.calls.iter().map(Call::name).collect()
        }

        fn count(&self, name: &str) -> usize {
            self.calls.iter().filter(|c| c.name() == name).count()
        }
    }

    impl SurfaceHandler for Recorder {
        fn setup(&mut self, _ctx: &mut Ctx<'_>) {
            self.calls.push(Call::Setup);
        }

        fn update(&mut self, ctx: &mut Ctx<'_>) {
            self.calls.push(Call::Update(*ctx.state()));
            for request in self.on_update.drain(..) {
                ctx.request(request);
            }
        }

        fn draw(&mut self, ctx: &mut Ctx<'_>, _gl: &mut dyn GlContext) {
            self.calls.push(Call::Draw(*ctx.state()));
        }

        fn exit(&mut self) {
            self.calls.push(Call::Exit);
        }

        fn key_pressed(&mut self, ctx: &mut Ctx<'_>, key: Key) {
            self.calls.push(Call::KeyPressed(key));
            for request in self.on_key.drain(..) {
                ctx.request(request);
            }
        }

        fn key_released(&mut self, _ctx: &mut Ctx<'_>, key: Key) {
            self.calls.push(Call::KeyReleased(key));
        }

        fn mouse_moved(&mut self, _ctx: &mut Ctx<'_>, position: Point) {
            self.calls.push(Call::Moved(position));
        }

        fn mouse_dragged(&mut self, _ctx: &mut Ctx<'_>, position: Point, button: MouseButton) {
            self.calls.push(Call::Dragged(position, button));
        }

        fn mouse_pressed(&mut self, _ctx: &mut Ctx<'_>, position: Point, button: MouseButton) {
            self.calls.push(Call::Pressed(position, button));
        }

        fn mouse_released(&mut self, _ctx: &mut Ctx<'_>, position: Point, button: MouseButton) {
            self.calls.push(Call::Released(position, button));
        }

        fn mouse_entered(&mut self, _ctx: &mut Ctx<'_>) {
            self.calls.push(Call::Entered);
        }

        fn mouse_exited(&mut self, _ctx: &mut Ctx<'_>) {
            self.calls.push(Call::Exited);
        }

        fn window_resized(&mut self, _ctx: &mut Ctx<'_>, size: Size) {
            self.calls.push(Call::Resized(size));
        }
    }

    type TestSurface = Surface<HeadlessHost, HeadlessContext, Recorder>;

    fn surface_with(host: HeadlessHost, config: SurfaceConfig) -> (TestSurface, ManualClock) {
        let clock = ManualClock::new();
        let surface = Surface::new(
            host,
            SharedContext::new(HeadlessContext::new()),
            Box::new(clock.clone()),
            Recorder::default(),
            &config,
        )
        .unwrap();
        (surface, clock)
    }

    fn surface() -> (TestSurface, ManualClock) {
        surface_with(
            HeadlessHost::new(Size::new(640.0, 480.0)),
            SurfaceConfig::default(),
        )
    }

    fn context_stats(surface: &TestSurface) -> crate::backend::headless::ContextStats {
        surface.shared_context().lock().unwrap().stats()
    }

    #[test]
    fn test_setup_runs_once() {
        let (mut surface, clock) = surface();

        surface.setup().unwrap();
        surface.setup().unwrap();

        assert!(surface.is_initialised());
        assert_eq!(surface.handler().count("setup"), 1);
        assert_eq!(surface.size(), Size::new(640.0, 480.0));

        let state = clock.state();
        assert_eq!(state.driver, Some(Driver::Timer));
        assert_eq!(state.interval, Duration::from_secs_f64(1.0 / 60.0));
    }

    #[test]
    fn test_frame_runs_setup_then_update_before_draw() {
        let (mut surface, _clock) = surface();
        let start = Instant::now();

        surface.frame(start).unwrap();
        surface.frame(start + Duration::from_millis(16)).unwrap();

        assert_eq!(
            surface.handler().names(),
            vec!["setup", "update", "draw", "update", "draw"]
        );
        assert_eq!(surface.frame_count(), 2);

        let stats = context_stats(&surface);
        assert_eq!(stats.flushes, 2);
        assert_eq!(stats.setup_screen, 2);
    }

    #[test]
    fn test_update_sees_completed_frames() {
        let (mut surface, _clock) = surface();
        let start = Instant::now();
        surface.frame(start).unwrap();
        surface.frame(start + Duration::from_millis(20)).unwrap();

        let counts: Vec<u64> = surface
            .handler()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Update(state) => Some(state.frame_count),
                _ => None,
            })
            .collect();
        assert_eq!(counts, vec![0, 1]);
        assert!((surface.frame_rate() - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_setup_screen_disabled() {
        let config = SurfaceConfig {
            enable_setup_screen: false,
            ..SurfaceConfig::default()
        };
        let (mut surface, _clock) =
            surface_with(HeadlessHost::new(Size::new(640.0, 480.0)), config);

        surface.frame(Instant::now()).unwrap();
        assert_eq!(context_stats(&surface).setup_screen, 0);
        assert_eq!(context_stats(&surface).flushes, 1);
    }

    #[test]
    fn test_setup_failure_is_fatal() {
        let clock = ManualClock::new();
        let mut surface = Surface::new(
            HeadlessHost::new(Size::new(640.0, 480.0)),
            SharedContext::new(HeadlessContext::failing()),
            Box::new(clock.clone()),
            Recorder::default(),
            &SurfaceConfig::default(),
        )
        .unwrap();

        assert_eq!(
            surface.setup(),
            Err(SurfaceError::Context(ContextError::MakeCurrent))
        );

        surface.on_tick(Instant::now());
        assert!(surface.is_finished());
        assert_eq!(
            surface.failure(),
            Some(&SurfaceError::Context(ContextError::MakeCurrent))
        );
        assert!(surface.handler().calls.is_empty());
        assert_eq!(clock.state().driver, None);
    }

    #[test]
    fn test_window_events_follow_last_call() {
        for len in 1..=4u32 {
            for bits in 0..(1u32 << len) {
                let (mut surface, _clock) = surface();
                let mut last = false;
                for i in 0..len {
                    last = bits & (1 << i) != 0;
                    surface.enable_window_events(last).unwrap();
                }

                assert_eq!(surface.window_events_enabled(), last);
                let expected = if last { 2 } else { 0 };
                assert_eq!(surface.host().installed_monitors(), expected);
            }
        }
    }

    #[test]
    fn test_window_events_from_config() {
        let config = SurfaceConfig {
            window_events: true,
            ..SurfaceConfig::default()
        };
        let (mut surface, _clock) =
            surface_with(HeadlessHost::new(Size::new(640.0, 480.0)), config);
        assert!(!surface.window_events_enabled());

        surface.setup().unwrap();
        assert!(surface.window_events_enabled());
        assert_eq!(surface.host().installed_monitors(), 2);
    }

    #[test]
    fn test_toggle_fullscreen_twice_restores_window() {
        let (mut surface, _clock) = surface();
        surface.setup().unwrap();
        let original = surface.host().current_window();
        let size = surface.size();

        surface.toggle_fullscreen().unwrap();
        assert!(surface.is_fullscreen());
        assert!(surface.is_transitioning());

        surface.pump_events();
        assert!(!surface.is_transitioning());
        assert_ne!(surface.host().current_window(), original);
        assert_eq!(surface.size(), Size::new(1920.0, 1080.0));

        surface.toggle_fullscreen().unwrap();
        surface.pump_events();
        assert!(!surface.is_fullscreen());
        assert_eq!(surface.host().current_window(), original);
        assert_eq!(surface.size(), size);

        // Same context throughout
        let stats = context_stats(&surface);
        assert!(stats.surface_changes >= 2);
        assert_eq!(stats.releases, 0);
        assert_eq!(
            surface
                .handler()
                .calls
                .iter()
                .filter(|c| matches!(c, Call::Resized(_)))
                .count(),
            2
        );
    }

    #[test]
    fn test_fullscreen_rejected_while_transitioning() {
        let (mut surface, _clock) = surface();
        surface.setup().unwrap();

        surface.set_fullscreen(true).unwrap();
        assert_eq!(
            surface.toggle_fullscreen(),
            Err(SurfaceError::TransitionInProgress)
        );
        assert_eq!(
            surface.set_fullscreen(false),
            Err(SurfaceError::TransitionInProgress)
        );
        assert_eq!(
            surface.set_fullscreen(true),
            Err(SurfaceError::TransitionInProgress)
        );

        surface.pump_events();
        // Already fullscreen: no-op
        surface.set_fullscreen(true).unwrap();
        assert!(surface.is_fullscreen());

        surface.exit_fullscreen().unwrap();
        assert_eq!(
            surface.exit_fullscreen(),
            Err(SurfaceError::TransitionInProgress)
        );
    }

    #[test]
    fn test_exit_fullscreen_when_windowed_is_noop() {
        let (mut surface, _clock) = surface();
        surface.exit_fullscreen().unwrap();
        assert!(!surface.is_fullscreen());
        assert_eq!(surface.host().pending_events(), 0);
    }

    #[test]
    fn test_fullscreen_to_specific_screen() {
        let screens = vec![
            Screen {
                id: ScreenId(1),
                frame: Rect::new(0.0, 0.0, 1440.0, 900.0),
                scale: 2.0,
                refresh_rate: Some(60.0),
            },
            Screen {
                id: ScreenId(2),
                frame: Rect::new(1440.0, 0.0, 1920.0, 1080.0),
                scale: 1.0,
                refresh_rate: Some(144.0),
            },
        ];
        let host = HeadlessHost::with_screens(Size::new(640.0, 480.0), screens);
        let (mut surface, _clock) = surface_with(host, SurfaceConfig::default());
        surface.setup().unwrap();

        assert_eq!(
            surface.set_fullscreen_to(ScreenId(7)),
            Err(SurfaceError::Host(HostError::UnknownScreen(7)))
        );
        assert!(!surface.is_fullscreen());

        surface.set_fullscreen_to(ScreenId(2)).unwrap();
        surface.pump_events();
        assert_eq!(surface.size(), Size::new(1920.0, 1080.0));
        assert_eq!(surface.refresh_rate(), 144.0);
        assert_eq!(
            surface.fullscreen_state().windows().map(|w| w.screen),
            Some(ScreenId(2))
        );
    }

    #[test]
    fn test_exit_while_fullscreen_releases_window() {
        let (mut surface, _clock) = surface();
        surface.setup().unwrap();
        surface.set_fullscreen(true).unwrap();
        surface.pump_events();
        let fullscreen = surface.host().fullscreen_window().unwrap();

        surface.exit().unwrap();

        assert!(!surface.is_fullscreen());
        assert_eq!(surface.host().fullscreen_window(), None);
        assert_eq!(surface.host().closed_windows(), &[fullscreen]);
    }

    #[test]
    fn test_exit_while_entering_fullscreen() {
        let (mut surface, _clock) = surface();
        surface.setup().unwrap();
        surface.set_fullscreen(true).unwrap();

        surface.exit().unwrap();
        assert!(!surface.is_fullscreen());
        assert_eq!(surface.host().fullscreen_window(), None);
    }

    #[test]
    fn test_exit_is_idempotent() {
        let (mut surface, clock) = surface();
        surface.setup().unwrap();
        surface.enable_window_events(true).unwrap();
        surface.frame(Instant::now()).unwrap();

        surface.exit().unwrap();
        surface.exit().unwrap();

        assert!(surface.is_exited());
        assert_eq!(surface.handler().count("exit"), 1);
        assert_eq!(clock.state().driver, None);
        assert_eq!(clock.state().stops, 1);
        assert_eq!(surface.host().installed_monitors(), 0);
        assert_eq!(context_stats(&surface).releases, 1);

        // Ticks and requests after exit
        surface.frame(Instant::now()).unwrap();
        assert_eq!(surface.frame_count(), 1);
        assert_eq!(surface.set_fullscreen(true), Err(SurfaceError::Exited));
    }

    #[test]
    fn test_exit_before_setup_skips_handler() {
        let (mut surface, _clock) = surface();
        surface.exit().unwrap();
        assert!(surface.handler().calls.is_empty());
        assert_eq!(surface.setup(), Err(SurfaceError::Exited));
    }

    #[test]
    fn test_shared_context_draws_into_each_surface() {
        let shared = SharedContext::new(HeadlessContext::new());
        let config = SurfaceConfig::default();
        let mut first = Surface::new(
            HeadlessHost::new(Size::new(320.0, 240.0)),
            shared.clone(),
            Box::new(ManualClock::new()),
            Recorder::default(),
            &config,
        )
        .unwrap();
        let mut second = Surface::new(
            HeadlessHost::new(Size::new(640.0, 480.0)),
            shared.clone(),
            Box::new(ManualClock::new()),
            Recorder::default(),
            &config,
        )
        .unwrap();
        let first_drawable = first.host().drawable();
        let second_drawable = second.host().drawable();
        assert_ne!(first_drawable, second_drawable);

        let now = Instant::now();
        first.frame(now).unwrap();
        assert_eq!(shared.lock().unwrap().drawable(), Some(first_drawable));
        second.frame(now).unwrap();
        assert_eq!(shared.lock().unwrap().drawable(), Some(second_drawable));

        // Window events rebind too
        first.host_mut().push_event(RawEvent::KeyDown {
            keycode: 0x00,
            character: Some('a'),
            repeat: false,
        });
        first.pump_events();
        assert_eq!(shared.lock().unwrap().drawable(), Some(first_drawable));
        assert_eq!(shared.lock().unwrap().stats().rebinds, 2);
    }

    #[test]
    fn test_shared_context_released_by_last_surface() {
        let shared = SharedContext::new(HeadlessContext::new());
        let config = SurfaceConfig::default();
        let mut first = Surface::new(
            HeadlessHost::new(Size::new(320.0, 240.0)),
            shared.clone(),
            Box::new(ManualClock::new()),
            Recorder::default(),
            &config,
        )
        .unwrap();
        let mut second = Surface::new(
            HeadlessHost::new(Size::new(640.0, 480.0)),
            shared.clone(),
            Box::new(ManualClock::new()),
            Recorder::default(),
            &config,
        )
        .unwrap();
        drop(shared);

        let now = Instant::now();
        first.frame(now).unwrap();
        second.frame(now).unwrap();
        assert!(first.shared_context().same_context(second.shared_context()));
        assert_eq!(second.shared_context().lock().unwrap().stats().flushes, 2);

        first.exit().unwrap();
        assert!(!second.shared_context().lock().unwrap().is_released());

        second.exit().unwrap();
        assert!(second.shared_context().lock().unwrap().is_released());
    }

    #[test]
    fn test_tiny_frame_rate_accepted() {
        let (mut surface, clock) = surface();
        surface.setup().unwrap();

        surface.set_frame_rate(1e-20).unwrap();
        assert_eq!(surface.target_frame_rate(), 1e-20);
        assert_eq!(clock.state().interval, MAX_PERIOD);

        let config = SurfaceConfig {
            frame_rate: 1e-20,
            ..SurfaceConfig::default()
        };
        let (mut surface, clock) = surface_with(HeadlessHost::new(config.size), config);
        surface.setup().unwrap();
        assert_eq!(clock.state().interval, MAX_PERIOD);
    }

    #[test]
    fn test_set_frame_rate() {
        let (mut surface, clock) = surface();
        surface.setup().unwrap();

        for rate in [1.0, 24.0, 30.0, 120.0, 240.0] {
            surface.set_frame_rate(rate).unwrap();
            assert_eq!(surface.target_frame_rate(), rate);
            assert_eq!(clock.state().interval, Duration::from_secs_f64(1.0 / rate));
        }

        for rate in [0.0, -30.0, f64::NAN] {
            assert!(matches!(
                surface.set_frame_rate(rate),
                Err(SurfaceError::InvalidFrameRate(_))
            ));
            assert_eq!(surface.target_frame_rate(), 240.0);
        }
    }

    #[test]
    fn test_display_link_switch() {
        let screens = vec![Screen {
            id: ScreenId(1),
            frame: Rect::new(0.0, 0.0, 1920.0, 1080.0),
            scale: 1.0,
            refresh_rate: Some(120.0),
        }];
        let host = HeadlessHost::with_screens(Size::new(640.0, 480.0), screens);
        let (mut surface, clock) = surface_with(host, SurfaceConfig::default());
        surface.setup().unwrap();
        assert_eq!(surface.driver(), Some(Driver::Timer));

        surface.enable_display_link(true).unwrap();
        assert_eq!(surface.driver(), Some(Driver::DisplayLink));
        assert_eq!(clock.state().refresh_rate, Some(120.0));
        assert!(surface.shared_context().lock().unwrap().vsync());

        // Target is advisory: interval untouched while the display link drives
        let interval = clock.state().interval;
        surface.set_frame_rate(30.0).unwrap();
        assert_eq!(clock.state().interval, interval);
        assert_eq!(surface.target_frame_rate(), 30.0);

        // Same setting again does not restart the clock
        let starts = clock.state().starts;
        surface.enable_display_link(true).unwrap();
        assert_eq!(clock.state().starts, starts);

        surface.enable_display_link(false).unwrap();
        assert_eq!(surface.driver(), Some(Driver::Timer));
        assert_eq!(clock.state().interval, Duration::from_secs_f64(1.0 / 30.0));
    }

    #[test]
    fn test_display_link_before_setup() {
        let (mut surface, clock) = surface();
        surface.enable_display_link(true).unwrap();
        assert_eq!(clock.state().driver, None);

        surface.setup().unwrap();
        assert_eq!(clock.state().driver, Some(Driver::DisplayLink));
        assert_eq!(clock.state().refresh_rate, Some(60.0));
    }

    #[test]
    fn test_resize_visible_before_next_draw() {
        let (mut surface, _clock) = surface();
        surface.setup().unwrap();

        surface.host_mut().resize(Size::new(800.0, 600.0));
        surface.pump_events();
        surface.frame(Instant::now()).unwrap();

        let draw = surface
            .handler()
            .calls
            .iter()
            .find_map(|c| match c {
                Call::Draw(state) => Some(*state),
                _ => None,
            })
            .unwrap();
        assert_eq!(draw.size(), Size::new(800.0, 600.0));
        assert_eq!(draw.viewport, Rect::new(0.0, 0.0, 800.0, 600.0));
        assert_eq!(
            surface.shared_context().lock().unwrap().last_viewport(),
            Some(Rect::new(0.0, 0.0, 800.0, 600.0))
        );
    }

    #[test]
    fn test_invalid_resize_ignored() {
        let (mut surface, _clock) = surface();
        surface.setup().unwrap();

        for size in [
            Size::new(0.0, 100.0),
            Size::new(100.0, -1.0),
            Size::new(f64::NAN, 100.0),
        ] {
            surface.window_resized(size).unwrap();
        }
        assert_eq!(surface.size(), Size::new(640.0, 480.0));
        assert_eq!(surface.handler().count("window_resized"), 0);
    }

    #[test]
    fn test_click_after_fullscreen_flips_against_new_height() {
        let (mut surface, _clock) = surface();
        surface.setup().unwrap();
        surface.set_fullscreen(true).unwrap();

        // Queued behind the resize the fullscreen swap announced
        surface.host_mut().push_event(RawEvent::MouseDown {
            button: 0,
            location: Point::new(100.0, 1070.0),
        });
        surface.pump_events();

        assert_eq!(surface.height(), 1080.0);
        assert_eq!(surface.mouse_y(), 10.0);
        assert_eq!(
            surface.handler().calls.last(),
            Some(&Call::Pressed(Point::new(100.0, 10.0), MouseButton::Left))
        );
    }

    #[test]
    fn test_input_forwarded_in_order() {
        let (mut surface, _clock) = surface();
        surface.setup().unwrap();

        let host = surface.host_mut();
        host.push_event(RawEvent::MouseEntered);
        host.push_event(RawEvent::MouseMoved {
            location: Point::new(10.0, 470.0),
        });
        host.push_event(RawEvent::MouseDown {
            button: 1,
            location: Point::new(10.0, 470.0),
        });
        host.push_event(RawEvent::MouseDragged {
            button: 1,
            location: Point::new(20.0, 460.0),
        });
        host.push_event(RawEvent::MouseUp {
            button: 1,
            location: Point::new(20.0, 460.0),
        });
        host.push_event(RawEvent::KeyDown {
            keycode: 0x00,
            character: Some('a'),
            repeat: false,
        });
        host.push_event(RawEvent::KeyUp {
            keycode: 0x35,
            character: None,
        });
        host.push_event(RawEvent::MouseExited);
        surface.pump_events();

        assert_eq!(
            surface.handler().calls[1..],
            [
                Call::Entered,
                Call::Moved(Point::new(10.0, 10.0)),
                Call::Pressed(Point::new(10.0, 10.0), MouseButton::Right),
                Call::Dragged(Point::new(20.0, 20.0), MouseButton::Right),
                Call::Released(Point::new(20.0, 20.0), MouseButton::Right),
                Call::KeyPressed(Key::Character('a')),
                Call::KeyReleased(Key::Named(NamedKey::Escape)),
                Call::Exited,
            ]
        );
        assert_eq!(surface.mouse_x(), 20.0);
        assert_eq!(surface.mouse_y(), 20.0);
        // Each forwarded event made the context current
        assert!(context_stats(&surface).make_current >= 9);
    }

    #[test]
    fn test_input_before_setup_records_pointer_only() {
        let (mut surface, _clock) = surface();
        surface
            .handle_input(InputEvent::MouseMoved(Point::new(5.0, 6.0)))
            .unwrap();

        assert!(surface.handler().calls.is_empty());
        assert_eq!(surface.state().mouse(), Point::new(5.0, 6.0));
    }

    #[test]
    fn test_requests_applied_after_callback() {
        let (mut surface, _clock) = surface();
        surface.setup().unwrap();
        surface.handler_mut().on_key = vec![Request::ToggleFullscreen, Request::SetFrameRate(15.0)];

        surface
            .handle_input(InputEvent::KeyPressed(Key::Character('f')))
            .unwrap();
        assert!(surface.is_fullscreen());
        assert_eq!(surface.target_frame_rate(), 15.0);

        surface.handler_mut().on_update = vec![Request::Exit];
        surface.frame(Instant::now()).unwrap();
        assert!(surface.is_exited());
        assert_eq!(surface.handler().names().last(), Some(&"exit"));
    }

    #[test]
    fn test_failed_request_does_not_stop_others() {
        let (mut surface, _clock) = surface();
        surface.setup().unwrap();
        surface.handler_mut().on_update = vec![
            Request::SetFrameRate(-1.0),
            Request::SetTranslucent(true),
        ];

        surface.frame(Instant::now()).unwrap();
        assert_eq!(surface.target_frame_rate(), 60.0);
        assert!(surface.is_translucent());
    }

    #[test]
    fn test_close_request_exits() {
        let (mut surface, _clock) = surface();
        surface.setup().unwrap();
        surface.host_mut().push_event(RawEvent::CloseRequested);
        surface.pump_events();
        assert!(surface.is_finished());
    }

    #[test]
    fn test_keep_aspect_letterboxes() {
        let (mut surface, _clock) = surface();
        surface.setup().unwrap();

        surface.set_keep_aspect(Some(2.0)).unwrap();
        assert_eq!(surface.host().content_aspect(), Some(2.0));
        assert_eq!(surface.viewport(), Rect::new(0.0, 80.0, 640.0, 320.0));

        surface.frame(Instant::now()).unwrap();
        assert_eq!(
            surface.shared_context().lock().unwrap().last_viewport(),
            Some(Rect::new(0.0, 80.0, 640.0, 320.0))
        );

        assert_eq!(
            surface.set_keep_aspect(Some(0.0)),
            Err(SurfaceError::InvalidAspect(0.0))
        );
        assert_eq!(surface.keep_aspect(), Some(2.0));

        surface.set_keep_aspect(None).unwrap();
        assert_eq!(surface.viewport(), Rect::new(0.0, 0.0, 640.0, 480.0));
        assert_eq!(surface.host().content_aspect(), None);
    }

    #[test]
    fn test_translucent() {
        let config = SurfaceConfig {
            translucent: true,
            ..SurfaceConfig::default()
        };
        let (mut surface, _clock) =
            surface_with(HeadlessHost::new(Size::new(640.0, 480.0)), config);
        assert!(surface.is_translucent());
        assert!(surface.host().is_translucent());
        assert!(!surface.shared_context().lock().unwrap().is_opaque());

        surface.set_translucent(false).unwrap();
        assert!(!surface.is_translucent());
        assert!(!surface.host().is_translucent());
        assert!(surface.shared_context().lock().unwrap().is_opaque());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let clock = ManualClock::new();
        let config = SurfaceConfig {
            frame_rate: 0.0,
            ..SurfaceConfig::default()
        };
        let result = Surface::new(
            HeadlessHost::new(Size::new(640.0, 480.0)),
            SharedContext::new(HeadlessContext::new()),
            Box::new(clock),
            Recorder::default(),
            &config,
        );
        assert!(matches!(result, Err(SurfaceError::InvalidFrameRate(_))));
    }
}
