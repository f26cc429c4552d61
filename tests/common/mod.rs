/*!
 * Test Event Loop
 * Minimal epoll-backed EventLoop implementation driving the integration tests
 */

use fdevent::{EventLoop, Interest, IoCallback, Ready};
use nix::errno::Errno;
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::os::fd::{BorrowedFd, RawFd};
use std::rc::Rc;
use std::time::{Duration, Instant};

const EVENTS_CAPACITY: usize = 8;

/// Single-threaded epoll reactor with just enough behavior for the tests:
/// one callback per descriptor, dispatch on readiness, and deferred removal
/// so a callback may deregister (or stop) its own source mid-dispatch.
pub struct TestLoop {
    epoll: Epoll,
    handlers: RefCell<HashMap<RawFd, IoCallback>>,
    dispatching: Cell<Option<RawFd>>,
    dispatching_removed: Cell<bool>,
    adds: Cell<usize>,
    removes: Cell<usize>,
}

impl TestLoop {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            epoll: Epoll::new(EpollCreateFlags::empty()).unwrap(),
            handlers: RefCell::new(HashMap::new()),
            dispatching: Cell::new(None),
            dispatching_removed: Cell::new(false),
            adds: Cell::new(0),
            removes: Cell::new(0),
        })
    }

    /// Total add_handler calls observed.
    pub fn adds(&self) -> usize {
        self.adds.get()
    }

    /// Total remove_handler calls observed.
    pub fn removes(&self) -> usize {
        self.removes.get()
    }

    /// Number of currently registered callbacks.
    pub fn handler_count(&self) -> usize {
        let in_flight =
            usize::from(self.dispatching.get().is_some() && !self.dispatching_removed.get());
        self.handlers.borrow().len() + in_flight
    }

    /// Wait up to `timeout_ms` for readiness and dispatch every ready
    /// descriptor once.
    pub fn run_once(&self, timeout_ms: u16) {
        let mut events = [EpollEvent::empty(); EVENTS_CAPACITY];
        let n = match self.epoll.wait(&mut events, EpollTimeout::from(timeout_ms)) {
            Ok(n) => n,
            Err(Errno::EINTR) => return,
            Err(errno) => panic!("epoll_wait failed: {}", errno),
        };

        let ready: Vec<(RawFd, Ready)> = events[..n]
            .iter()
            .map(|event| (event.data() as RawFd, ready_from(event.events())))
            .collect();

        for (fd, ready) in ready {
            // Take the callback out so it can mutate the registry while
            // running; restore it unless it deregistered itself.
            let Some(mut callback) = self.handlers.borrow_mut().remove(&fd) else {
                continue;
            };

            self.dispatching.set(Some(fd));
            self.dispatching_removed.set(false);
            callback(self, ready);
            let keep = !self.dispatching_removed.get();
            self.dispatching.set(None);

            if keep {
                self.handlers.borrow_mut().insert(fd, callback);
            }
        }
    }

    /// Pump the loop until `done` reports true or `deadline` elapses.
    /// Returns the final value of `done`.
    pub fn run_until(&self, deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if done() {
                return true;
            }
            self.run_once(10);
        }
        done()
    }
}

impl EventLoop for TestLoop {
    fn add_handler(&self, fd: RawFd, interest: Interest, callback: IoCallback) {
        let mut flags = EpollFlags::empty();
        if interest.contains(Interest::READABLE) {
            flags |= EpollFlags::EPOLLIN;
        }
        if interest.contains(Interest::WRITABLE) {
            flags |= EpollFlags::EPOLLOUT;
        }

        // The descriptor is owned by the registering source; epoll only
        // needs to observe it.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        self.epoll.add(borrowed, EpollEvent::new(flags, fd as u64)).unwrap();

        if self.dispatching.get() == Some(fd) {
            self.dispatching_removed.set(true);
        }
        self.handlers.borrow_mut().insert(fd, callback);
        self.adds.set(self.adds.get() + 1);
    }

    fn remove_handler(&self, fd: RawFd) {
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        let _ = self.epoll.delete(borrowed);

        if self.dispatching.get() == Some(fd) {
            self.dispatching_removed.set(true);
        } else {
            self.handlers.borrow_mut().remove(&fd);
        }
        self.removes.set(self.removes.get() + 1);
    }
}

fn ready_from(flags: EpollFlags) -> Ready {
    let mut ready = Ready::empty();
    if flags.contains(EpollFlags::EPOLLIN) {
        ready |= Ready::READABLE;
    }
    if flags.contains(EpollFlags::EPOLLOUT) {
        ready |= Ready::WRITABLE;
    }
    if flags.contains(EpollFlags::EPOLLERR) {
        ready |= Ready::ERROR;
    }
    if flags.contains(EpollFlags::EPOLLHUP) {
        ready |= Ready::HANGUP;
    }
    ready
}

/// Initialize test logging once; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
