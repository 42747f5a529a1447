//! Fullscreen presentation state
//!
//! Entering and leaving fullscreen are two-phase: the surface asks the host to
//! swap windows, then the host reports that the swap has settled. While a
//! swap is in flight no other fullscreen request is accepted.

use crate::backend::{ScreenId, WindowRef};
use crate::error::SurfaceError;
use crate::geometry::Size;

/// Windows involved in a fullscreen presentation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FullscreenWindows {
    /// Window hosting the drawable in windowed mode, restored on exit
    pub original: WindowRef,
    /// Undecorated window covering the screen
    pub fullscreen: WindowRef,
    /// Screen being covered
    pub screen: ScreenId,
    /// Drawable size before entering fullscreen
    pub restore_size: Size,
}

/// A settled transition
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    Entered(FullscreenWindows),
    Exited(FullscreenWindows),
}

/// Fullscreen state machine
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FullscreenState {
    #[default]
    Windowed,
    Entering(FullscreenWindows),
    Fullscreen(FullscreenWindows),
    Exiting(FullscreenWindows),
}

impl FullscreenState {
    /// A fullscreen window is held
    pub fn is_fullscreen(&self) -> bool {
        !matches!(self, FullscreenState::Windowed)
    }

    /// A window swap is in flight
    pub fn is_transitioning(&self) -> bool {
        matches!(
            self,
            FullscreenState::Entering(_) | FullscreenState::Exiting(_)
        )
    }

    /// Windows held in any non-windowed state
    pub fn windows(&self) -> Option<&FullscreenWindows> {
        match self {
            FullscreenState::Windowed => None,
            FullscreenState::Entering(w)
            | FullscreenState::Fullscreen(w)
            | FullscreenState::Exiting(w) => Some(w),
        }
    }

    /// Record a started enter transition
    pub fn begin_enter(&mut self, windows: FullscreenWindows) -> Result<(), SurfaceError> {
        match self {
            FullscreenState::Windowed => {
                *self = FullscreenState::Entering(windows);
                Ok(())
            }
            _ => Err(SurfaceError::TransitionInProgress),
        }
    }

    /// Record a started exit transition
    pub fn begin_exit(&mut self) -> Result<FullscreenWindows, SurfaceError> {
        match *self {
            FullscreenState::Fullscreen(windows) => {
                *self = FullscreenState::Exiting(windows);
                Ok(windows)
            }
            _ => Err(SurfaceError::TransitionInProgress),
        }
    }

    /// Settle the in-flight transition; `None` if nothing was in flight
    pub fn finish(&mut self) -> Option<Transition> {
        match *self {
            FullscreenState::Entering(windows) => {
                *self = FullscreenState::Fullscreen(windows);
                Some(Transition::Entered(windows))
            }
            FullscreenState::Exiting(windows) => {
                *self = FullscreenState::Windowed;
                Some(Transition::Exited(windows))
            }
            _ => None,
        }
    }

    /// Drop all window references
    ///
    /// Returns the windows and whether the host still has to close the
    /// fullscreen window (false when an exit was already in flight).
    pub fn take(&mut self) -> Option<(FullscreenWindows, bool)> {
        let taken = match *self {
            FullscreenState::Windowed => None,
            FullscreenState::Entering(w) | FullscreenState::Fullscreen(w) => Some((w, true)),
            FullscreenState::Exiting(w) => Some((w, false)),
        };
        *self = FullscreenState::Windowed;
        taken
    }
}
