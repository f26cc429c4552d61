/*!
 * Signaler
 * Converts a set of process signals into a readable descriptor
 */

use super::state::SourceState;
use super::types::{SourceError, SourceKind, SourceResult};
use crate::events::{EventLoop, Ready};
use log::{debug, error, warn};
use nix::sys::signal::{sigprocmask, SigSet, SigmaskHow, Signal};
use nix::sys::signalfd::{SfdFlags, SignalFd};
use std::cell::RefCell;
use std::os::fd::{AsFd, AsRawFd};
use std::rc::Rc;

/// Signal handler callback type
pub type SignalHandler = Box<dyn Fn(Signal)>;

/// Translates process signals into read-readiness on a `signalfd`.
///
/// Construction blocks the configured signals **process-wide** (so their
/// default disposition never fires) and binds a non-blocking close-on-exec
/// descriptor to exactly that set. Once started, the event loop dispatches
/// pending signals to the handler on its own thread, with a normal stack and
/// normal locking discipline instead of async-signal context.
///
/// The blocked-signal mask is process-global state with no teardown: dropping
/// a `Signaler` closes its descriptor but never restores the previous mask.
/// Composing multiple instances with overlapping signal sets is unspecified -
/// both will observe deliveries of the shared signal, in no particular order.
pub struct Signaler {
    state: SourceState,
    sfd: RefCell<Option<SignalFd>>,
    signals: RefCell<Vec<Signal>>,
    handler: SignalHandler,
}

impl Signaler {
    /// Create a signaler for a single signal.
    pub fn new<F>(signal: Signal, handler: F) -> Rc<Self>
    where
        F: Fn(Signal) + 'static,
    {
        Self::with_signals(&[signal], handler)
    }

    /// Create a signaler for a set of signals.
    ///
    /// On failure to block the signals or to open the descriptor, the error
    /// is logged and the returned signaler is permanently unconfigured;
    /// calling [`start`](Self::start) on it is a contract violation.
    pub fn with_signals<F>(signals: &[Signal], handler: F) -> Rc<Self>
    where
        F: Fn(Signal) + 'static,
    {
        let signaler = Rc::new(Self {
            state: SourceState::new(SourceKind::Signal),
            sfd: RefCell::new(None),
            signals: RefCell::new(Vec::new()),
            handler: Box::new(handler),
        });
        signaler.reset_fd(signals);
        signaler
    }

    /// Rebind the signaler to a new signal set.
    ///
    /// Blocks the new set (additively - previously blocked signals stay
    /// blocked) and replaces the descriptor. Not valid while running.
    pub fn reset_fd(&self, signals: &[Signal]) {
        if self.state.is_running() {
            warn!("reset_fd on running signaler");
            return;
        }

        self.signals.replace(signals.to_vec());

        match Self::open_fd(signals) {
            Ok(sfd) => {
                self.state.configure(sfd.as_fd().as_raw_fd());
                *self.sfd.borrow_mut() = Some(sfd);
            }
            Err(err) => {
                error!("signaler configuration failed: {}", err);
                self.state.deconfigure();
                *self.sfd.borrow_mut() = None;
            }
        }
    }

    /// Register with the loop for read readiness.
    ///
    /// No-op with a warning if already running. Panics if construction
    /// failed (unconfigured descriptor).
    pub fn start(self: &Rc<Self>, event_loop: &Rc<dyn EventLoop>) {
        let this = Rc::clone(self);
        self.state.start(
            event_loop,
            Box::new(move |event_loop, ready| this.on_ready(event_loop, ready)),
        );
    }

    /// Deregister from the loop. No-op with a warning if not running.
    pub fn stop(&self) {
        self.state.stop();
    }

    fn open_fd(signals: &[Signal]) -> SourceResult<SignalFd> {
        let mut mask = SigSet::empty();
        for signal in signals {
            mask.add(*signal);
        }

        // Process-wide, and intentionally never undone on drop.
        sigprocmask(SigmaskHow::SIG_BLOCK, Some(&mask), None)
            .map_err(SourceError::BlockSignals)?;

        SignalFd::with_flags(&mask, SfdFlags::SFD_NONBLOCK | SfdFlags::SFD_CLOEXEC)
            .map_err(SourceError::OpenSignalFd)
    }

    fn on_ready(self: &Rc<Self>, _event_loop: &dyn EventLoop, _ready: Ready) {
        // Hold an extra owning reference so a handler that drops the last
        // external reference or stops the signaler cannot destroy it mid-call.
        let _guard = Rc::clone(self);

        match self.read_one() {
            Ok(signal) => {
                debug!("signaler fd {} delivering {:?}", self.state.raw_fd(), signal);
                (self.handler)(signal);
            }
            Err(err) => error!("dropping signal event: {}", err),
        }
    }

    /// Consume exactly one pending signalfd record and validate it against
    /// the configured set. A record outside the set guards against
    /// kernel/mask races and is dropped.
    fn read_one(&self) -> SourceResult<Signal> {
        let kind = SourceKind::Signal;

        let read = match self.sfd.borrow_mut().as_mut() {
            Some(sfd) => sfd.read_signal(),
            None => return Err(SourceError::EmptyRead { kind }),
        };

        let info = match read {
            Ok(Some(info)) => info,
            Ok(None) => return Err(SourceError::EmptyRead { kind }),
            Err(errno) => return Err(SourceError::ReadFailed { kind, errno }),
        };

        let signal = Signal::try_from(info.ssi_signo as i32)
            .map_err(|_| SourceError::UnexpectedSignal {
                signo: info.ssi_signo,
            })?;

        if !self.signals.borrow().contains(&signal) {
            return Err(SourceError::UnexpectedSignal {
                signo: info.ssi_signo,
            });
        }

        Ok(signal)
    }
}

impl super::traits::EventSource for Signaler {
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
