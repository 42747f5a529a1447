//! Error types
//!
//! Every fallible surface operation returns [`SurfaceError`]. The backend
//! traits report their own narrower errors which convert into it.

use thiserror::Error;

/// Errors raised by a GPU rendering context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("failed to create rendering context: {0}")]
    Creation(String),
    #[error("failed to make rendering context current")]
    MakeCurrent,
    #[error("shared context lock is poisoned")]
    Poisoned,
    #[error("rendering context has been released")]
    Released,
}

/// Errors raised by the native window host
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("unknown screen {0}")]
    UnknownScreen(u64),
    #[error("unknown window {0}")]
    UnknownWindow(u64),
    #[error("failed to create window: {0}")]
    WindowCreation(String),
    #[error("failed to install event monitor")]
    MonitorInstall,
}

/// Errors raised by a refresh clock
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClockError {
    #[error("failed to register clock source: {0}")]
    Register(String),
    #[error("failed to spawn display link thread: {0}")]
    Spawn(String),
    #[error("invalid refresh rate {0}")]
    InvalidRefreshRate(f64),
}

/// Errors raised while reading configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

/// Errors raised by surface operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SurfaceError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Clock(#[from] ClockError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid frame rate {0}, must be finite and positive")]
    InvalidFrameRate(f64),
    #[error("invalid aspect ratio {0}, must be finite and positive")]
    InvalidAspect(f64),
    #[error("a fullscreen transition is already in progress")]
    TransitionInProgress,
    #[error("surface has exited")]
    Exited,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_error_converts() {
        let err: SurfaceError = ContextError::MakeCurrent.into();
        assert_eq!(err, SurfaceError::Context(ContextError::MakeCurrent));
        assert_eq!(err.to_string(), "failed to make rendering context current");
    }

    #[test]
    fn test_config_error_message() {
        let err = ConfigError::InvalidValue {
            key: "GLSURFACE_FPS".to_string(),
            value: "fast".to_string(),
        };
        assert_eq!(err.to_string(), "invalid value \"fast\" for GLSURFACE_FPS");
    }
}
