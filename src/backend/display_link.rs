//! Display-refresh clock
//!
//! A background thread ticks once per refresh period and hands each tick to a
//! notify callback, which typically forwards it to the UI thread. A
//! [`TickGate`] keeps at most one tick outstanding: while the UI thread has not
//! picked up the previous tick, further refreshes are skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::backend::period_for_rate;
use crate::error::ClockError;

/// Flag shared between the display link thread and the UI thread
#[derive(Debug, Clone, Default)]
pub struct TickGate {
    pending: Arc<AtomicBool>,
}

impl TickGate {
    /// Create an open gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate for a new tick; false while a tick is outstanding
    pub fn try_acquire(&self) -> bool {
        !self.pending.swap(true, Ordering::AcqRel)
    }

    /// Mark the outstanding tick as picked up
    pub fn release(&self) {
        self.pending.store(false, Ordering::Release);
    }

    /// Whether a tick is outstanding
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

/// A running display link thread
#[derive(Debug)]
pub struct DisplayLink {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    period: Duration,
}

impl DisplayLink {
    /// Start ticking at `refresh_rate` Hz
    ///
    /// `notify` runs on the display link thread; returning false stops it.
    pub fn start<F>(refresh_rate: f64, gate: TickGate, mut notify: F) -> Result<Self, ClockError>
    where
        F: FnMut(Instant) -> bool + Send + 'static,
    {
        if !refresh_rate.is_finite() || refresh_rate <= 0.0 {
            return Err(ClockError::InvalidRefreshRate(refresh_rate));
        }

        let period = period_for_rate(refresh_rate);
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name("glsurface-display-link".to_string())
            .spawn(move || {
                let mut next = Instant::now() + period;
                while thread_running.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if next > now {
                        // Woken early by `stop`, or spuriously
                        thread::park_timeout(next - now);
                        continue;
                    }

                    next += period;
                    if next < now {
                        // Fell behind; resynchronize instead of bursting
                        next = now + period;
                    }

                    if !gate.try_acquire() {
                        trace!("Display link tick skipped, previous frame pending");
                        continue;
                    }
                    if !notify(now) {
                        debug!("Display link receiver gone, stopping");
                        break;
                    }
                }
            })
            .map_err(|e| ClockError::Spawn(e.to_string()))?;

        debug!("Display link started at {:.2} Hz", refresh_rate);

        Ok(Self {
            running,
            thread: Some(thread),
            period,
        })
    }

    /// Refresh period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether the thread is still running
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the thread and wait for it; no-op when already stopped
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            if thread.thread().id() != thread::current().id() && thread.join().is_err() {
                debug!("Display link thread panicked");
            }
            debug!("Display link stopped");
        }
    }
}

impl Drop for DisplayLink {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_link(gate: TickGate) -> (DisplayLink, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let link = DisplayLink::start(1000.0, gate, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            true
        })
        .unwrap();
        (link, count)
    }

    #[test]
    fn test_rejects_bad_refresh_rate() {
        let result = DisplayLink::start(0.0, TickGate::new(), |_| true);
        assert_eq!(result.unwrap_err(), ClockError::InvalidRefreshRate(0.0));
    }

    #[test]
    fn test_gate_keeps_one_tick_outstanding() {
        let gate = TickGate::new();
        let (mut link, count) = counting_link(gate.clone());

        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(gate.is_pending());

        gate.release();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), 2);

        link.stop();
        assert!(!link.is_running());
    }

    #[test]
    fn test_stops_when_receiver_gone() {
        let gate = TickGate::new();
        let mut link = DisplayLink::start(1000.0, gate, |_| false).unwrap();

        thread::sleep(Duration::from_millis(50));
        assert!(!link.is_running());
        link.stop();
    }

    #[test]
    fn test_stop_interrupts_long_period() {
        let mut link = DisplayLink::start(1e-20, TickGate::new(), |_| true).unwrap();
        let start = Instant::now();
        link.stop();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!link.is_running());
    }

    #[test]
    fn test_period() {
        let link = DisplayLink::start(50.0, TickGate::new(), |_| true).unwrap();
        assert_eq!(link.period(), Duration::from_millis(20));
    }
}
