//! GPU rendering context abstraction and the shared-context lock
//!
//! A surface never owns its context directly: it holds a [`SharedContext`],
//! a cloneable handle around one context guarded by a mutex. Surfaces that
//! should share GPU objects are given clones of the same handle.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::error::ContextError;
use crate::geometry::Rect;

/// Native drawable a context renders into
///
/// On macOS this is the address of the surface's NSView. The host owning the
/// drawable keeps it alive for as long as it hands out the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawableHandle(pub usize);

/// A GPU rendering context bound to a drawable
///
/// A context handed to several surfaces is rebound to each surface's drawable
/// before that surface makes it current.
pub trait GlContext {
    /// Render into `drawable` from now on; cheap when already bound to it
    fn bind_drawable(&mut self, drawable: DrawableHandle) -> Result<(), ContextError>;

    /// Make this context current on the calling thread
    fn make_current(&mut self) -> Result<(), ContextError>;

    /// Set the viewport to `viewport` and clear the drawable
    fn setup_screen(&mut self, viewport: Rect);

    /// Present the back buffer
    fn flush(&mut self);

    /// The drawable moved to another window or changed size
    fn surface_changed(&mut self);

    /// Toggle surface opacity (false for translucent surfaces)
    fn set_opaque(&mut self, opaque: bool);

    /// Sync buffer swaps to the display refresh
    fn set_vsync(&mut self, enabled: bool);

    /// Release the underlying GPU resources
    fn release(&mut self);
}

struct Inner<C> {
    context: Mutex<C>,
    /// Handles that have not detached yet
    handles: AtomicUsize,
}

/// Cloneable handle to a mutex-guarded rendering context
///
/// Each handle counts as one holder until it is detached or dropped. The
/// holder that detaches last releases the context.
pub struct SharedContext<C> {
    inner: Arc<Inner<C>>,
    detached: bool,
}

/// Clones of a detached handle are detached too; they never hold a claim
impl<C> Clone for SharedContext<C> {
    fn clone(&self) -> Self {
        if !self.detached {
            self.inner.handles.fetch_add(1, Ordering::AcqRel);
        }
        Self {
            inner: Arc::clone(&self.inner),
            detached: self.detached,
        }
    }
}

impl<C> Drop for SharedContext<C> {
    fn drop(&mut self) {
        if !self.detached {
            self.inner.handles.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl<C: GlContext> SharedContext<C> {
    /// Wrap a context
    pub fn new(context: C) -> Self {
        Self {
            inner: Arc::new(Inner {
                context: Mutex::new(context),
                handles: AtomicUsize::new(1),
            }),
            detached: false,
        }
    }

    /// Acquire the context, blocking while another holder uses it
    pub fn lock(&self) -> Result<ContextGuard<'_, C>, ContextError> {
        self.inner
            .context
            .lock()
            .map(|guard| ContextGuard { guard })
            .map_err(|_| ContextError::Poisoned)
    }

    /// Acquire the context only if nobody else holds it
    pub fn try_lock(&self) -> Option<ContextGuard<'_, C>> {
        self.inner
            .context
            .try_lock()
            .ok()
            .map(|guard| ContextGuard { guard })
    }

    /// Number of attached handles
    pub fn holders(&self) -> usize {
        self.inner.handles.load(Ordering::Acquire)
    }

    /// Whether another attached handle refers to the same context
    pub fn is_shared(&self) -> bool {
        self.holders() > 1
    }

    /// Whether two handles refer to the same context
    pub fn same_context(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether this handle has detached
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Give up this handle's claim on the context
    ///
    /// The last handle to detach releases the context and gets true back.
    /// Detaching twice does nothing.
    pub fn detach(&mut self) -> Result<bool, ContextError> {
        if self.detached {
            return Ok(false);
        }
        self.detached = true;

        let remaining = self.inner.handles.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining > 0 {
            debug!("Context still held by {} other handles", remaining);
            return Ok(false);
        }
        self.lock()?.release();
        Ok(true)
    }
}

/// Exclusive access to a shared context; released on drop
pub struct ContextGuard<'a, C> {
    guard: MutexGuard<'a, C>,
}

impl<C> ContextGuard<'_, C> {
    /// Release the lock explicitly
    pub fn unlock(self) {
        drop(self);
    }
}

impl<C> Deref for ContextGuard<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.guard
    }
}

impl<C> DerefMut for ContextGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.guard
    }
}
