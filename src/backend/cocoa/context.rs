//! NSOpenGLContext-backed rendering context

use log::{debug, info};
use objc2::rc::{Allocated, Retained};
use objc2::runtime::AnyObject;
use objc2::{class, msg_send};
use objc2_app_kit::NSView;

use crate::context::{DrawableHandle, GlContext};
use crate::error::ContextError;
use crate::geometry::Rect;

// NSOpenGLPixelFormatAttribute values
const PFA_DOUBLE_BUFFER: u32 = 5;
const PFA_COLOR_SIZE: u32 = 8;
const PFA_ALPHA_SIZE: u32 = 11;
const PFA_DEPTH_SIZE: u32 = 12;
const PFA_ACCELERATED: u32 = 73;
const PFA_ALLOW_OFFLINE_RENDERERS: u32 = 96;
const PFA_OPENGL_PROFILE: u32 = 99;
const PROFILE_VERSION_3_2_CORE: u32 = 0x3200;

// NSOpenGLContextParameter values
const CP_SWAP_INTERVAL: isize = 222;
const CP_SURFACE_OPACITY: isize = 236;

const GL_COLOR_BUFFER_BIT: u32 = 0x0000_4000;
const GL_DEPTH_BUFFER_BIT: u32 = 0x0000_0100;

#[link(name = "OpenGL", kind = "framework")]
extern "C" {
    fn glViewport(x: i32, y: i32, width: i32, height: i32);
    fn glClearColor(red: f32, green: f32, blue: f32, alpha: f32);
    fn glClear(mask: u32);
}

/// An NSOpenGLContext attached to a view
///
/// One context can serve several surfaces through a cloned
/// [`crate::SharedContext`]: each surface binds its own view before drawing,
/// and the context follows it. Surfaces that should draw concurrently into
/// their own views instead get one context each from [`CocoaGlContext::new_shared`],
/// which puts them in the same share group so textures and buffers are visible
/// to all of them.
#[derive(Debug)]
pub struct CocoaGlContext {
    context: Retained<AnyObject>,
    /// Kept alive for the context's lifetime
    format: Retained<AnyObject>,
    /// The view last passed to `setView:`
    drawable: DrawableHandle,
    opaque: bool,
    released: bool,
}

impl CocoaGlContext {
    /// Create a double-buffered 3.2 core context drawing into `view`
    pub fn new(view: &NSView) -> Result<Self, ContextError> {
        let format = pixel_format()?;
        Self::with_format(view, format, None)
    }

    /// Create a context for `view` sharing GPU objects with `other`
    pub fn new_shared(view: &NSView, other: &CocoaGlContext) -> Result<Self, ContextError> {
        if other.released {
            return Err(ContextError::Released);
        }
        Self::with_format(view, other.format.clone(), Some(&*other.context))
    }

    fn with_format(
        view: &NSView,
        format: Retained<AnyObject>,
        share: Option<&AnyObject>,
    ) -> Result<Self, ContextError> {
        let context: Option<Retained<AnyObject>> = unsafe {
            let alloc: Allocated<AnyObject> = msg_send![class!(NSOpenGLContext), alloc];
            msg_send![alloc, initWithFormat: &*format, shareContext: share]
        };
        let context = context
            .ok_or_else(|| ContextError::Creation("NSOpenGLContext init failed".to_string()))?;

        unsafe {
            let _: () = msg_send![&*context, setView: view];
        }

        info!(
            "Created OpenGL 3.2 core context{}",
            if share.is_some() { " in a share group" } else { "" }
        );
        Ok(Self {
            context,
            format,
            drawable: view_handle(view),
            opaque: true,
            released: false,
        })
    }

    fn set_parameter(&self, parameter: isize, value: i32) {
        unsafe {
            let _: () = msg_send![
                &*self.context,
                setValues: &value as *const i32,
                forParameter: parameter
            ];
        }
    }
}

/// Drawable handle for `view`
pub fn view_handle(view: &NSView) -> DrawableHandle {
    DrawableHandle(view as *const NSView as usize)
}

fn pixel_format() -> Result<Retained<AnyObject>, ContextError> {
    let attributes = [
        PFA_DOUBLE_BUFFER,
        PFA_ACCELERATED,
        PFA_ALLOW_OFFLINE_RENDERERS,
        PFA_COLOR_SIZE,
        24,
        PFA_ALPHA_SIZE,
        8,
        PFA_DEPTH_SIZE,
        24,
        PFA_OPENGL_PROFILE,
        PROFILE_VERSION_3_2_CORE,
        0,
    ];

    let format: Option<Retained<AnyObject>> = unsafe {
        let alloc: Allocated<AnyObject> = msg_send![class!(NSOpenGLPixelFormat), alloc];
        msg_send![alloc, initWithAttributes: attributes.as_ptr()]
    };
    format.ok_or_else(|| ContextError::Creation("no matching pixel format".to_string()))
}

impl GlContext for CocoaGlContext {
    fn bind_drawable(&mut self, drawable: DrawableHandle) -> Result<(), ContextError> {
        if self.released {
            return Err(ContextError::Released);
        }
        if drawable == self.drawable {
            return Ok(());
        }
        // Handles come from `CocoaHost::drawable`, whose view outlives the call
        let view = drawable.0 as *const NSView;
        if view.is_null() {
            return Err(ContextError::MakeCurrent);
        }
        unsafe {
            let _: () = msg_send![&*self.context, setView: &*view];
        }
        self.drawable = drawable;
        debug!("Context moved to view {:#x}", drawable.0);
        Ok(())
    }

    fn make_current(&mut self) -> Result<(), ContextError> {
        if self.released {
            return Err(ContextError::Released);
        }
        unsafe {
            let _: () = msg_send![&*self.context, makeCurrentContext];
        }
        Ok(())
    }

    fn setup_screen(&mut self, viewport: Rect) {
        let alpha = if self.opaque { 1.0 } else { 0.0 };
        unsafe {
            glViewport(
                viewport.origin.x as i32,
                viewport.origin.y as i32,
                viewport.size.width as i32,
                viewport.size.height as i32,
            );
            glClearColor(0.0, 0.0, 0.0, alpha);
            glClear(GL_COLOR_BUFFER_BIT | GL_DEPTH_BUFFER_BIT);
        }
    }

    fn flush(&mut self) {
        unsafe {
            let _: () = msg_send![&*self.context, flushBuffer];
        }
    }

    fn surface_changed(&mut self) {
        if self.released {
            return;
        }
        unsafe {
            let _: () = msg_send![&*self.context, update];
        }
    }

    fn set_opaque(&mut self, opaque: bool) {
        self.opaque = opaque;
        self.set_parameter(CP_SURFACE_OPACITY, opaque as i32);
    }

    fn set_vsync(&mut self, enabled: bool) {
        self.set_parameter(CP_SWAP_INTERVAL, enabled as i32);
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        unsafe {
            let _: () = msg_send![&*self.context, clearDrawable];
            let _: () = msg_send![class!(NSOpenGLContext), clearCurrentContext];
        }
        debug!("Released OpenGL context");
    }
}

#[cfg(test)]
mod tests {
    // Context creation requires a display environment
}
