/*!
 * Source State
 * Registration state machine shared by all descriptor-backed sources
 */

use super::types::SourceKind;
use crate::events::{EventLoop, Interest, IoCallback};
use log::{info, warn};
use std::cell::{Cell, RefCell};
use std::os::fd::RawFd;
use std::rc::{Rc, Weak};

pub(crate) const INVALID_FD: RawFd = -1;

/// Shared state machine: Unconfigured -> Configured -> Running <-> Stopped.
///
/// Both the Signaler and the Timer embed one of these; the descriptor itself
/// is owned by the embedding source, this only tracks the raw value for
/// registration. The loop reference is weak so a source never keeps its loop
/// alive.
pub(crate) struct SourceState {
    kind: SourceKind,
    fd: Cell<RawFd>,
    running: Cell<bool>,
    event_loop: RefCell<Option<Weak<dyn EventLoop>>>,
}

impl SourceState {
    pub(crate) fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            fd: Cell::new(INVALID_FD),
            running: Cell::new(false),
            event_loop: RefCell::new(None),
        }
    }

    pub(crate) fn kind(&self) -> SourceKind {
        self.kind
    }

    pub(crate) fn raw_fd(&self) -> RawFd {
        self.fd.get()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.get()
    }

    pub(crate) fn is_configured(&self) -> bool {
        self.fd.get() != INVALID_FD
    }

    pub(crate) fn configure(&self, fd: RawFd) {
        self.fd.set(fd);
    }

    pub(crate) fn deconfigure(&self) {
        self.fd.set(INVALID_FD);
    }

    pub(crate) fn set_event_loop(&self, event_loop: &Rc<dyn EventLoop>) {
        *self.event_loop.borrow_mut() = Some(Rc::downgrade(event_loop));
    }

    pub(crate) fn event_loop(&self) -> Option<Rc<dyn EventLoop>> {
        self.event_loop.borrow().as_ref().and_then(Weak::upgrade)
    }

    /// Register for read readiness. Starting an unconfigured source is a
    /// contract violation; starting a running source warns and is a no-op.
    pub(crate) fn start(&self, event_loop: &Rc<dyn EventLoop>, callback: IoCallback) {
        assert!(
            self.is_configured(),
            "start on unconfigured {} source",
            self.kind
        );
        if self.running.get() {
            warn!("{} was started", self.kind);
            return;
        }

        info!("start {} fd {}", self.kind, self.fd.get());

        self.running.set(true);
        self.set_event_loop(event_loop);
        event_loop.add_handler(self.fd.get(), Interest::READABLE, callback);
    }

    /// Deregister. Stopping an unconfigured source is a contract violation;
    /// stopping a stopped source warns and is a no-op.
    pub(crate) fn stop(&self) {
        assert!(
            self.is_configured(),
            "stop on unconfigured {} source",
            self.kind
        );
        if !self.running.get() {
            warn!("{} was stopped", self.kind);
            return;
        }

        info!("stop {} fd {}", self.kind, self.fd.get());

        self.running.set(false);
        if let Some(event_loop) = self.event_loop() {
            event_loop.remove_handler(self.fd.get());
        }
    }
}
