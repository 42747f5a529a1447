//! Event loop integration
//!
//! Wraps a calloop event loop whose data is the frame target (normally a
//! [`crate::Surface`]). The timer driver is a calloop timer; the display link
//! thread marshals its ticks back onto the loop's thread through a calloop
//! channel, so update/draw always run on the thread running the loop.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use calloop::channel::{self, Channel};
use calloop::timer::{TimeoutAction, Timer};
use calloop::{EventLoop as CalLoop, LoopHandle, LoopSignal, RegistrationToken};
use log::{debug, error};

use crate::backend::display_link::{DisplayLink, TickGate};
use crate::backend::{Driver, RefreshClock};
use crate::error::ClockError;

/// How long one loop iteration may wait before pumping host events again
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Data driven by the event loop
pub trait FrameTarget {
    /// A clock tick: run one frame
    fn on_tick(&mut self, now: Instant);

    /// Drain pending window system events
    fn pump_events(&mut self);

    /// The loop should stop
    fn is_finished(&self) -> bool;
}

/// Event loop wrapper
pub struct EventLoop<D: 'static> {
    /// Calloop event loop
    event_loop: CalLoop<'static, D>,
    /// Loop signal for waking
    signal: LoopSignal,
    /// Set by [`EventLoop::stop`]
    stopped: Arc<AtomicBool>,
}

impl<D: 'static> EventLoop<D> {
    /// Create a new event loop
    pub fn new() -> anyhow::Result<Self> {
        let event_loop = CalLoop::try_new()?;
        let signal = event_loop.get_signal();

        Ok(Self {
            event_loop,
            signal,
            stopped: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get a handle to register event sources
    pub fn handle(&self) -> LoopHandle<'static, D> {
        self.event_loop.handle()
    }

    /// Get the loop signal for waking
    pub fn signal(&self) -> LoopSignal {
        self.signal.clone()
    }

    /// Run one iteration of the event loop
    pub fn dispatch(&mut self, timeout: Option<Duration>, data: &mut D) -> anyhow::Result<()> {
        self.event_loop.dispatch(timeout, data)?;
        Ok(())
    }

    /// Stop [`EventLoop::run`] after the current iteration
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.signal.wakeup();
    }

    /// Wake the event loop from another thread
    pub fn wake(&self) {
        self.signal.wakeup();
    }
}

impl<D: FrameTarget + 'static> EventLoop<D> {
    /// A refresh clock registering its sources on this loop
    pub fn clock(&self) -> CalloopClock<D> {
        CalloopClock::new(self.handle())
    }

    /// Pump host events and dispatch clock sources until the target finishes
    pub fn run(&mut self, data: &mut D) -> anyhow::Result<()> {
        debug!("Starting event loop");

        while !self.stopped.load(Ordering::Acquire) {
            data.pump_events();
            if data.is_finished() {
                break;
            }

            if let Err(e) = self.dispatch(Some(POLL_INTERVAL), data) {
                error!("Event loop error: {}", e);
                return Err(e);
            }
            if data.is_finished() {
                break;
            }
        }

        debug!("Event loop finished");
        Ok(())
    }
}

struct ActiveDisplayLink {
    token: RegistrationToken,
    link: DisplayLink,
}

/// [`RefreshClock`] backed by calloop sources
pub struct CalloopClock<D: 'static> {
    handle: LoopHandle<'static, D>,
    /// Read by the timer callback on every firing
    interval: Rc<Cell<Duration>>,
    timer: Option<RegistrationToken>,
    display_link: Option<ActiveDisplayLink>,
}

impl<D: FrameTarget + 'static> CalloopClock<D> {
    /// Create a stopped clock
    pub fn new(handle: LoopHandle<'static, D>) -> Self {
        Self {
            handle,
            interval: Rc::new(Cell::new(Duration::from_secs(1) / 60)),
            timer: None,
            display_link: None,
        }
    }

    /// Current timer interval
    pub fn interval(&self) -> Duration {
        self.interval.get()
    }
}

impl<D: FrameTarget + 'static> RefreshClock for CalloopClock<D> {
    fn start_timer(&mut self, interval: Duration) -> Result<(), ClockError> {
        self.stop();
        self.interval.set(interval);

        let next = Rc::clone(&self.interval);
        let token = self
            .handle
            .insert_source(
                Timer::from_duration(interval),
                move |deadline, _, target: &mut D| {
                    target.on_tick(Instant::now());
                    TimeoutAction::ToInstant(next_deadline(deadline, next.get(), Instant::now()))
                },
            )
            .map_err(|e| ClockError::Register(e.error.to_string()))?;

        self.timer = Some(token);
        debug!("Timer driver started, interval {:?}", interval);
        Ok(())
    }

    fn start_display_link(&mut self, refresh_rate: f64) -> Result<(), ClockError> {
        self.stop();

        let (sender, channel): (channel::Sender<Instant>, Channel<Instant>) = channel::channel();
        let gate = TickGate::new();
        let ui_gate = gate.clone();

        let token = self
            .handle
            .insert_source(channel, move |event, _, target: &mut D| {
                if let channel::Event::Msg(now) = event {
                    ui_gate.release();
                    target.on_tick(now);
                }
            })
            .map_err(|e| ClockError::Register(e.error.to_string()))?;

        let link = match DisplayLink::start(refresh_rate, gate, move |now| sender.send(now).is_ok())
        {
            Ok(link) => link,
            Err(e) => {
                self.handle.remove(token);
                return Err(e);
            }
        };

        self.display_link = Some(ActiveDisplayLink { token, link });
        Ok(())
    }

    fn set_interval(&mut self, interval: Duration) {
        self.interval.set(interval);
    }

    fn stop(&mut self) {
        self.teardown();
    }

    fn driver(&self) -> Option<Driver> {
        if self.timer.is_some() {
            Some(Driver::Timer)
        } else if self.display_link.is_some() {
            Some(Driver::DisplayLink)
        } else {
            None
        }
    }
}

/// Schedule from the previous deadline so frame work does not stretch the period
fn next_deadline(deadline: Instant, interval: Duration, now: Instant) -> Instant {
    let next = deadline.checked_add(interval).unwrap_or(now);
    if next <= now {
        // Fell behind; resynchronize instead of bursting
        now.checked_add(interval).unwrap_or(now)
    } else {
        next
    }
}

impl<D: 'static> CalloopClock<D> {
    fn teardown(&mut self) {
        if let Some(token) = self.timer.take() {
            self.handle.remove(token);
            debug!("Timer driver stopped");
        }
        if let Some(mut active) = self.display_link.take() {
            active.link.stop();
            self.handle.remove(active.token);
        }
    }
}

impl<D: 'static> Drop for CalloopClock<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}
