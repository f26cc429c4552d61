/*!
 * Timer
 * Converts a one-shot or repeating interval into a readable descriptor
 */

use super::state::SourceState;
use super::types::{SourceError, SourceKind, SourceResult};
use crate::events::{EventLoop, Ready};
use log::{debug, error, warn};
use nix::sys::time::TimeSpec;
use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};
use nix::unistd;
use std::os::fd::{AsFd, AsRawFd};
use std::rc::Rc;
use std::time::Duration;

/// Timer handler callback type, invoked with the number of intervals that
/// elapsed since the last dispatch.
pub type TimerHandler = Box<dyn Fn(u64)>;

/// Monotonic-clock timer backed by a `timerfd`.
///
/// The timer is armed at construction to first fire after `after` and then,
/// when `repeat` is nonzero, every `repeat` thereafter; a zero `repeat` arms
/// a one-shot. The handler is invoked once per readiness event regardless of
/// how many expirations coalesced while the loop was busy - the coalesced
/// count is passed to the handler, so strict per-interval semantics are one
/// caller-side loop away.
pub struct Timer {
    state: SourceState,
    tfd: Option<TimerFd>,
    handler: TimerHandler,
}

impl Timer {
    /// Create a timer bound to `event_loop`. Durations of zero mean "no
    /// repeat" for `repeat` and "fire immediately" for `after`.
    ///
    /// On failure to create the timer descriptor, the error is logged and
    /// the returned timer is permanently unconfigured; calling
    /// [`start`](Self::start) on it is a contract violation.
    pub fn new<F>(
        event_loop: &Rc<dyn EventLoop>,
        handler: F,
        repeat: Duration,
        after: Duration,
    ) -> Rc<Self>
    where
        F: Fn(u64) + 'static,
    {
        let state = SourceState::new(SourceKind::Timer);
        state.set_event_loop(event_loop);

        let tfd = match Self::create_fd() {
            Ok(tfd) => {
                state.configure(tfd.as_fd().as_raw_fd());
                Some(tfd)
            }
            Err(err) => {
                error!("timer configuration failed: {}", err);
                None
            }
        };

        let timer = Rc::new(Self {
            state,
            tfd,
            handler: Box::new(handler),
        });
        timer.arm(repeat, after);
        timer
    }

    /// Register with the loop captured at construction.
    ///
    /// No-op with a warning if already running. Panics if construction
    /// failed (unconfigured descriptor).
    pub fn start(self: &Rc<Self>) {
        assert!(
            self.state.is_configured(),
            "start on unconfigured timer source"
        );
        let Some(event_loop) = self.state.event_loop() else {
            warn!("timer event loop is gone");
            return;
        };

        let this = Rc::clone(self);
        self.state.start(
            &event_loop,
            Box::new(move |event_loop, ready| this.on_ready(event_loop, ready)),
        );
    }

    /// Deregister from the loop. No-op with a warning if not running.
    pub fn stop(&self) {
        self.state.stop();
    }

    /// Reprogram the arming parameters in place.
    ///
    /// Valid whether running or stopped; registration state is untouched and
    /// the new cadence takes effect for the next expiration.
    pub fn reset(&self, repeat: Duration, after: Duration) {
        self.arm(repeat, after);
    }

    fn create_fd() -> SourceResult<TimerFd> {
        TimerFd::new(
            ClockId::CLOCK_MONOTONIC,
            TimerFlags::TFD_NONBLOCK | TimerFlags::TFD_CLOEXEC,
        )
        .map_err(SourceError::OpenTimerFd)
    }

    fn arm(&self, repeat: Duration, after: Duration) {
        let Some(tfd) = self.tfd.as_ref() else { return };

        // A zero initial value would disarm the timerfd; clamp so the timer
        // still fires.
        let after = if after.is_zero() {
            Duration::from_nanos(1)
        } else {
            after
        };

        let expiration = if repeat.is_zero() {
            Expiration::OneShot(TimeSpec::from_duration(after))
        } else {
            Expiration::IntervalDelayed(
                TimeSpec::from_duration(after),
                TimeSpec::from_duration(repeat),
            )
        };

        if let Err(errno) = tfd.set(expiration, TimerSetTimeFlags::empty()) {
            error!("{}", SourceError::ArmTimer(errno));
        }
    }

    fn on_ready(self: &Rc<Self>, _event_loop: &dyn EventLoop, _ready: Ready) {
        // Hold an extra owning reference so a handler that drops the last
        // external reference or stops the timer cannot destroy it mid-call.
        let _guard = Rc::clone(self);

        match self.read_expirations() {
            Ok(expirations) => {
                debug!(
                    "timer fd {} expired {} time(s)",
                    self.state.raw_fd(),
                    expirations
                );
                (self.handler)(expirations);
            }
            Err(err) => error!("dropping timer event: {}", err),
        }
    }

    /// Consume the pending expiration count (a host-byte-order u64 per
    /// timerfd semantics).
    fn read_expirations(&self) -> SourceResult<u64> {
        let kind = SourceKind::Timer;

        let Some(tfd) = self.tfd.as_ref() else {
            return Err(SourceError::EmptyRead { kind });
        };

        let mut buf = [0u8; 8];
        match unistd::read(tfd.as_fd().as_raw_fd(), &mut buf) {
            Ok(n) if n == buf.len() => Ok(u64::from_ne_bytes(buf)),
            Ok(n) => Err(SourceError::ShortRead { bytes: n }),
            Err(errno) => Err(SourceError::ReadFailed { kind, errno }),
        }
    }
}

impl super::traits::EventSource for Timer {
    fn kind(&self) -> SourceKind {
        self.state.kind()
    }

    fn raw_fd(&self) -> std::os::fd::RawFd {
        self.state.raw_fd()
    }

    fn is_running(&self) -> bool {
        self.state.is_running()
    }
}
