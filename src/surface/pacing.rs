//! Frame-rate pacing and measurement

use std::time::{Duration, Instant};

use crate::backend::{period_for_rate, MAX_PERIOD};
use crate::error::SurfaceError;

/// Tracks the target frame rate, the measured rate and the frame counter
#[derive(Debug, Clone)]
pub struct FramePacer {
    /// Target frames per second
    target: f64,
    /// Rate measured from the last two updates
    measured: f64,
    /// Completed frames
    frame_count: u64,
    /// Start of the previous update
    last_update: Option<Instant>,
    /// Time between the previous two updates
    last_frame_time: Duration,
}

impl FramePacer {
    /// Create a pacer targeting `target` frames per second
    pub fn new(target: f64) -> Result<Self, SurfaceError> {
        validate(target)?;
        Ok(Self {
            target,
            measured: 0.0,
            frame_count: 0,
            last_update: None,
            last_frame_time: Duration::ZERO,
        })
    }

    /// Change the target; invalid rates leave it unchanged
    pub fn set_target(&mut self, target: f64) -> Result<(), SurfaceError> {
        validate(target)?;
        self.target = target;
        Ok(())
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    /// Timer interval for the target rate, at most [`MAX_PERIOD`]
    pub fn interval(&self) -> Duration {
        period_for_rate(self.target)
    }

    /// Measured frames per second
    pub fn measured(&self) -> f64 {
        self.measured
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Time between the previous two updates
    pub fn last_frame_time(&self) -> Duration {
        self.last_frame_time
    }

    /// Record the start of an update at `now`
    pub fn begin_frame(&mut self, now: Instant) {
        if let Some(last) = self.last_update {
            let elapsed = now.saturating_duration_since(last);
            if !elapsed.is_zero() {
                self.last_frame_time = elapsed;
                self.measured = 1.0 / elapsed.as_secs_f64();
            }
        }
        self.last_update = Some(now);
    }

    /// Record a completed draw
    pub fn end_frame(&mut self) {
        self.frame_count += 1;
    }
}

fn validate(rate: f64) -> Result<(), SurfaceError> {
    if rate.is_finite() && rate > 0.0 {
        Ok(())
    } else {
        Err(SurfaceError::InvalidFrameRate(rate))
    }
}
