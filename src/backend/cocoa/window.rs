//! NSWindow host for a GL view

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::ptr::NonNull;
use std::rc::Rc;

use block2::RcBlock;
use log::{debug, info, warn};
use objc2::rc::Retained;
use objc2::runtime::{AnyObject, ProtocolObject};
use objc2::{define_class, msg_send, DefinedClass, MainThreadOnly};
use objc2_app_kit::{
    NSApplication, NSBackingStoreType, NSColor, NSEvent, NSEventMask, NSScreen, NSView, NSWindow,
    NSWindowDelegate, NSWindowStyleMask,
};
use objc2_foundation::{
    ns_string, MainThreadMarker, NSNotification, NSObject, NSObjectProtocol, NSPoint, NSRect,
    NSSize, NSString,
};

use crate::backend::cocoa::context::view_handle;
use crate::backend::cocoa::input::{self, EventQueue};
use crate::backend::cocoa::view::GlView;
use crate::backend::{MonitorHandles, MonitorId, Screen, ScreenId, WindowHost, WindowRef};
use crate::config::SurfaceConfig;
use crate::context::DrawableHandle;
use crate::error::HostError;
use crate::geometry::{Rect, Size};
use crate::input::RawEvent;

/// Above the menu bar and the dock
const FULLSCREEN_WINDOW_LEVEL: isize = 25;

struct FullscreenWindow {
    id: WindowRef,
    window: Retained<NSWindow>,
    screen: ScreenId,
}

/// Window host presenting a [`GlView`] in an NSWindow
pub struct CocoaHost {
    mtm: MainThreadMarker,
    app: Retained<NSApplication>,
    /// The windowed-mode window
    window: Retained<NSWindow>,
    /// Kept alive; the window only holds it weakly
    _delegate: Retained<GlWindowDelegate>,
    view: Retained<GlView>,
    fullscreen: Option<FullscreenWindow>,
    events: EventQueue,
    /// Report a finished transition once the swap settles
    transition_pending: bool,
    monitors: HashMap<MonitorId, Retained<AnyObject>>,
    next_id: u64,
}

impl CocoaHost {
    const WINDOW: WindowRef = WindowRef(1);

    /// Create and show a window sized and titled from `config`
    pub fn new(mtm: MainThreadMarker, config: &SurfaceConfig) -> anyhow::Result<Self> {
        let app = NSApplication::sharedApplication(mtm);
        let events: EventQueue = Rc::new(RefCell::new(VecDeque::new()));

        let frame = NSRect::new(
            NSPoint::new(0.0, 0.0),
            NSSize::new(config.size.width, config.size.height),
        );
        let style = NSWindowStyleMask::Titled
            | NSWindowStyleMask::Closable
            | NSWindowStyleMask::Miniaturizable
            | NSWindowStyleMask::Resizable;
        let window = new_window(mtm, frame, style);
        window.setTitle(&NSString::from_str(&config.title));
        window.setAcceptsMouseMovedEvents(true);
        window.center();

        let delegate = GlWindowDelegate::new(mtm, events.clone());
        window.setDelegate(Some(ProtocolObject::from_ref(&*delegate)));

        let view = GlView::new(mtm, frame, events.clone());
        let content: &NSView = &view;
        window.setContentView(Some(content));
        window.makeKeyAndOrderFront(None);
        window.makeFirstResponder(Some(content));

        let size = view.drawable_size();
        info!(
            "Created window \"{}\", drawable {}x{}",
            config.title, size.width, size.height
        );

        Ok(Self {
            mtm,
            app,
            window,
            _delegate: delegate,
            view,
            fullscreen: None,
            events,
            transition_pending: false,
            monitors: HashMap::new(),
            next_id: 2,
        })
    }

    /// The view the rendering context draws into
    pub fn view(&self) -> &NSView {
        &self.view
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn current_ns_window(&self) -> &NSWindow {
        match &self.fullscreen {
            Some(fullscreen) => &fullscreen.window,
            None => &self.window,
        }
    }

    fn ns_screen(&self, id: ScreenId) -> Option<Retained<NSScreen>> {
        let index = usize::try_from(id.0.checked_sub(1)?).ok()?;
        let screens = NSScreen::screens(self.mtm);
        if index < screens.count() {
            Some(screens.objectAtIndex(index))
        } else {
            None
        }
    }

    /// Dispatch pending native events, then report size and transition changes
    ///
    /// The view queues resizes as they happen; the check here catches changes
    /// AppKit made without resizing the view's frame.
    fn pump_native(&mut self) {
        loop {
            let event = unsafe {
                self.app.nextEventMatchingMask_untilDate_inMode_dequeue(
                    NSEventMask::Any,
                    None,
                    ns_string!("kCFRunLoopDefaultMode"),
                    true,
                )
            };
            let Some(event) = event else {
                break;
            };
            self.app.sendEvent(&event);
        }
        self.app.updateWindows();

        self.view.sync_size();
        if self.transition_pending {
            self.transition_pending = false;
            self.events
                .borrow_mut()
                .push_back(RawEvent::TransitionFinished);
        }
    }

    /// Move the view into `window` and make it key
    fn present_in(&self, window: &NSWindow) {
        let content: &NSView = &self.view;
        window.setContentView(Some(content));
        window.makeKeyAndOrderFront(None);
        window.makeFirstResponder(Some(content));
    }
}

impl WindowHost for CocoaHost {
    fn current_window(&self) -> WindowRef {
        self.fullscreen
            .as_ref()
            .map(|fullscreen| fullscreen.id)
            .unwrap_or(Self::WINDOW)
    }

    fn current_screen(&self) -> ScreenId {
        if let Some(fullscreen) = &self.fullscreen {
            return fullscreen.screen;
        }
        let Some(current) = self.current_ns_window().screen() else {
            return ScreenId(1);
        };
        NSScreen::screens(self.mtm)
            .iter()
            .position(|screen| std::ptr::eq(&*screen, &*current))
            .map(|index| ScreenId(index as u64 + 1))
            .unwrap_or(ScreenId(1))
    }

    fn screens(&self) -> Vec<Screen> {
        NSScreen::screens(self.mtm)
            .iter()
            .enumerate()
            .map(|(index, screen)| {
                let frame = screen.frame();
                let fps = unsafe { screen.maximumFramesPerSecond() };
                Screen {
                    id: ScreenId(index as u64 + 1),
                    frame: Rect::new(
                        frame.origin.x,
                        frame.origin.y,
                        frame.size.width,
                        frame.size.height,
                    ),
                    scale: screen.backingScaleFactor(),
                    refresh_rate: (fps > 0).then_some(fps as f64),
                }
            })
            .collect()
    }

    fn drawable_size(&self) -> Size {
        self.view.drawable_size()
    }

    fn drawable(&self) -> DrawableHandle {
        view_handle(self.view())
    }

    fn next_event(&mut self) -> Option<RawEvent> {
        if self.events.borrow().is_empty() {
            self.pump_native();
        }
        self.events.borrow_mut().pop_front()
    }

    fn enter_fullscreen(&mut self, screen: ScreenId) -> Result<WindowRef, HostError> {
        if self.fullscreen.is_some() {
            return Err(HostError::WindowCreation(
                "a fullscreen window is already open".to_string(),
            ));
        }
        let ns_screen = self
            .ns_screen(screen)
            .ok_or(HostError::UnknownScreen(screen.0))?;

        let window = new_window(self.mtm, ns_screen.frame(), NSWindowStyleMask::Borderless);
        window.setLevel(FULLSCREEN_WINDOW_LEVEL);
        window.setAcceptsMouseMovedEvents(true);
        window.setOpaque(self.window.isOpaque());
        window.setBackgroundColor(Some(&self.window.backgroundColor()));
        window.setFrame_display(ns_screen.frame(), true);

        self.present_in(&window);
        self.window.orderOut(None);

        let id = WindowRef(self.next_id());
        debug!("Fullscreen window {:?} on {:?}", id, screen);
        self.fullscreen = Some(FullscreenWindow { id, window, screen });
        self.transition_pending = true;
        Ok(id)
    }

    fn leave_fullscreen(
        &mut self,
        fullscreen: WindowRef,
        original: WindowRef,
    ) -> Result<(), HostError> {
        if original != Self::WINDOW {
            return Err(HostError::UnknownWindow(original.0));
        }
        let window = match self.fullscreen.take() {
            Some(current) if current.id == fullscreen => current.window,
            other => {
                self.fullscreen = other;
                return Err(HostError::UnknownWindow(fullscreen.0));
            }
        };

        self.present_in(&self.window);
        window.orderOut(None);
        window.close();

        debug!("Closed fullscreen window {:?}", fullscreen);
        self.transition_pending = true;
        Ok(())
    }

    fn install_monitors(&mut self) -> Result<MonitorHandles, HostError> {
        // Events for other applications
        let global = {
            let view = self.view.clone();
            let block = RcBlock::new(move |event: NonNull<NSEvent>| {
                view.forward(unsafe { event.as_ref() });
            });
            unsafe { NSEvent::addGlobalMonitorForEventsMatchingMask_handler(input::input_mask(), &block) }
        };
        let global = global.ok_or(HostError::MonitorInstall)?;

        // Events for this application outside the view, which reports its own
        let local = {
            let view = self.view.clone();
            let block = RcBlock::new(move |event: NonNull<NSEvent>| -> *mut NSEvent {
                let raw_event = event.as_ptr();
                let event = unsafe { event.as_ref() };
                let own = view
                    .window()
                    .is_some_and(|window| window.windowNumber() == unsafe { event.windowNumber() });
                if !own {
                    view.forward(event);
                }
                raw_event
            });
            unsafe { NSEvent::addLocalMonitorForEventsMatchingMask_handler(input::input_mask(), &block) }
        };
        let Some(local) = local else {
            unsafe { NSEvent::removeMonitor(&global) };
            return Err(HostError::MonitorInstall);
        };

        let handles = MonitorHandles {
            global: MonitorId(self.next_id()),
            local: MonitorId(self.next_id()),
        };
        self.monitors.insert(handles.global, global);
        self.monitors.insert(handles.local, local);
        Ok(handles)
    }

    fn remove_monitors(&mut self, monitors: MonitorHandles) {
        for id in [monitors.global, monitors.local] {
            match self.monitors.remove(&id) {
                Some(monitor) => unsafe { NSEvent::removeMonitor(&monitor) },
                None => warn!("Unknown event monitor {:?}", id),
            }
        }
    }

    fn set_translucent(&mut self, translucent: bool) {
        let color = if translucent {
            NSColor::clearColor()
        } else {
            NSColor::windowBackgroundColor()
        };
        self.window.setOpaque(!translucent);
        self.window.setBackgroundColor(Some(&color));
        if let Some(fullscreen) = &self.fullscreen {
            fullscreen.window.setOpaque(!translucent);
            fullscreen.window.setBackgroundColor(Some(&color));
        }
    }

    fn set_content_aspect(&mut self, ratio: Option<f64>) {
        match ratio {
            Some(ratio) => self.window.setContentAspectRatio(NSSize::new(ratio, 1.0)),
            // Resetting the increments clears the aspect constraint
            None => self.window.setContentResizeIncrements(NSSize::new(1.0, 1.0)),
        }
    }
}

impl Drop for CocoaHost {
    fn drop(&mut self) {
        for (_, monitor) in self.monitors.drain() {
            unsafe { NSEvent::removeMonitor(&monitor) };
        }
        if let Some(fullscreen) = self.fullscreen.take() {
            fullscreen.window.close();
        }
        self.window.close();
    }
}

fn new_window(mtm: MainThreadMarker, frame: NSRect, style: NSWindowStyleMask) -> Retained<NSWindow> {
    let window = unsafe {
        NSWindow::initWithContentRect_styleMask_backing_defer(
            mtm.alloc(),
            frame,
            style,
            NSBackingStoreType::Buffered,
            false,
        )
    };
    // Owned by the Retained handle, not by AppKit
    unsafe { window.setReleasedWhenClosed(false) };
    window
}

/// Window delegate ivars
pub struct GlWindowDelegateIvars {
    events: EventQueue,
}

define_class!(
    #[unsafe(super(NSObject))]
    #[thread_kind = MainThreadOnly]
    #[name = "GlSurfaceWindowDelegate"]
    #[ivars = GlWindowDelegateIvars]
    pub struct GlWindowDelegate;

    unsafe impl NSObjectProtocol for GlWindowDelegate {}

    unsafe impl NSWindowDelegate for GlWindowDelegate {
        #[unsafe(method(windowShouldClose:))]
        fn window_should_close(&self, _sender: &NSWindow) -> bool {
            debug!("Window close requested");
            self.ivars()
                .events
                .borrow_mut()
                .push_back(RawEvent::CloseRequested);
            // Closed by the host once the surface has exited
            false
        }

        #[unsafe(method(windowDidChangeScreen:))]
        fn window_did_change_screen(&self, _notification: &NSNotification) {
            debug!("Window moved to another screen");
        }
    }
);

impl GlWindowDelegate {
    fn new(mtm: MainThreadMarker, events: EventQueue) -> Retained<Self> {
        let this = mtm.alloc::<Self>().set_ivars(GlWindowDelegateIvars { events });
        unsafe { msg_send![super(this), init] }
    }
}

#[cfg(test)]
mod tests {
    // Window tests require a display environment
}
