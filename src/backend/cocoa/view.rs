//! NSView subclass hosting the GL drawable

use std::cell::Cell;

use log::debug;
use objc2::rc::Retained;
use objc2::runtime::AnyObject;
use objc2::{define_class, msg_send, AllocAnyThread, DefinedClass, MainThreadOnly};
use objc2_app_kit::{NSEvent, NSTrackingArea, NSTrackingAreaOptions, NSView};
use objc2_foundation::{MainThreadMarker, NSObjectProtocol, NSRect, NSSize};

use crate::backend::cocoa::input::{self, EventQueue};
use crate::geometry::Size;
use crate::input::RawEvent;

/// View ivars
pub struct GlViewIvars {
    /// Queue input and resize events are pushed to
    events: EventQueue,
    /// Drawable size last queued as a resize
    reported: Cell<Size>,
}

define_class!(
    #[unsafe(super(NSView))]
    #[thread_kind = MainThreadOnly]
    #[name = "GlSurfaceView"]
    #[ivars = GlViewIvars]
    pub struct GlView;

    unsafe impl NSObjectProtocol for GlView {}

    impl GlView {
        #[unsafe(method(acceptsFirstResponder))]
        fn accepts_first_responder(&self) -> bool {
            true
        }

        #[unsafe(method(acceptsFirstMouse:))]
        fn accepts_first_mouse(&self, _event: Option<&NSEvent>) -> bool {
            true
        }

        #[unsafe(method(setFrameSize:))]
        fn set_frame_size(&self, size: NSSize) {
            let _: () = unsafe { msg_send![super(self), setFrameSize: size] };
            self.sync_size();
        }

        #[unsafe(method(viewDidChangeBackingProperties))]
        fn view_did_change_backing_properties(&self) {
            self.sync_size();
        }

        #[unsafe(method(keyDown:))]
        fn key_down(&self, event: &NSEvent) {
            self.forward(event);
        }

        #[unsafe(method(keyUp:))]
        fn key_up(&self, event: &NSEvent) {
            self.forward(event);
        }

        #[unsafe(method(flagsChanged:))]
        fn flags_changed(&self, event: &NSEvent) {
            self.forward(event);
        }

        #[unsafe(method(mouseDown:))]
        fn mouse_down(&self, event: &NSEvent) {
            self.forward(event);
        }

        #[unsafe(method(mouseUp:))]
        fn mouse_up(&self, event: &NSEvent) {
            self.forward(event);
        }

        #[unsafe(method(rightMouseDown:))]
        fn right_mouse_down(&self, event: &NSEvent) {
            self.forward(event);
        }

        #[unsafe(method(rightMouseUp:))]
        fn right_mouse_up(&self, event: &NSEvent) {
            self.forward(event);
        }

        #[unsafe(method(otherMouseDown:))]
        fn other_mouse_down(&self, event: &NSEvent) {
            self.forward(event);
        }

        #[unsafe(method(otherMouseUp:))]
        fn other_mouse_up(&self, event: &NSEvent) {
            self.forward(event);
        }

        #[unsafe(method(mouseMoved:))]
        fn mouse_moved(&self, event: &NSEvent) {
            self.forward(event);
        }

        #[unsafe(method(mouseDragged:))]
        fn mouse_dragged(&self, event: &NSEvent) {
            self.forward(event);
        }

        #[unsafe(method(rightMouseDragged:))]
        fn right_mouse_dragged(&self, event: &NSEvent) {
            self.forward(event);
        }

        #[unsafe(method(otherMouseDragged:))]
        fn other_mouse_dragged(&self, event: &NSEvent) {
            self.forward(event);
        }

        #[unsafe(method(mouseEntered:))]
        fn mouse_entered(&self, event: &NSEvent) {
            self.forward(event);
        }

        #[unsafe(method(mouseExited:))]
        fn mouse_exited(&self, event: &NSEvent) {
            self.forward(event);
        }
    }
);

impl GlView {
    /// Create a view pushing its input into `events`
    pub fn new(mtm: MainThreadMarker, frame: NSRect, events: EventQueue) -> Retained<Self> {
        let this = mtm.alloc::<Self>().set_ivars(GlViewIvars {
            events,
            reported: Cell::new(Size::new(frame.size.width, frame.size.height)),
        });
        let this: Retained<Self> = unsafe { msg_send![super(this), initWithFrame: frame] };

        // Drawable in backing pixels on Retina screens
        let _: () = unsafe { msg_send![&*this, setWantsBestResolutionOpenGLSurface: true] };
        this.ivars().reported.set(this.drawable_size());

        // Tracks the visible rect, so it never needs updating
        let options = NSTrackingAreaOptions::MouseEnteredAndExited
            | NSTrackingAreaOptions::MouseMoved
            | NSTrackingAreaOptions::ActiveInKeyWindow
            | NSTrackingAreaOptions::InVisibleRect;
        let owner: &AnyObject = &this;
        let area = unsafe {
            NSTrackingArea::initWithRect_options_owner_userInfo(
                NSTrackingArea::alloc(),
                NSRect::ZERO,
                options,
                Some(owner),
                None,
            )
        };
        this.addTrackingArea(&area);

        debug!(
            "Created GL view, {}x{} points",
            frame.size.width, frame.size.height
        );
        this
    }

    /// Drawable size in pixels
    pub fn drawable_size(&self) -> Size {
        let backing = self.convertRectToBacking(self.bounds());
        Size::new(backing.size.width, backing.size.height)
    }

    /// Drawable size last queued as a resize
    pub fn reported_size(&self) -> Size {
        self.ivars().reported.get()
    }

    /// Queue a resize if the drawable changed since the last one
    ///
    /// Runs before any input is queued, so events located against the new
    /// size always follow the resize that announces it.
    pub fn sync_size(&self) {
        let size = self.drawable_size();
        if size != self.ivars().reported.get() {
            self.ivars().reported.set(size);
            self.ivars()
                .events
                .borrow_mut()
                .push_back(RawEvent::Resized { size });
        }
    }

    /// Queue `event` behind any pending resize
    pub fn forward(&self, event: &NSEvent) {
        self.sync_size();
        let location = input::view_location(self, event);
        if let Some(raw) = input::raw_event(event, location) {
            self.ivars().events.borrow_mut().push_back(raw);
        }
    }
}
