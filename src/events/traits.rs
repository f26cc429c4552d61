/*!
 * Event Loop Traits
 * Registration surface of the reactor that dispatches the event sources
 */

use super::types::{Interest, Ready};
use std::os::fd::RawFd;

/// Per-descriptor callback invoked by the loop's dispatch thread.
///
/// The loop passes itself back in so a callback can register or deregister
/// descriptors from within its own dispatch.
pub type IoCallback = Box<dyn FnMut(&dyn EventLoop, Ready)>;

/// Readiness-multiplexing event loop.
///
/// The loop is an external collaborator: this crate only consumes the trait.
/// All callbacks run on the loop's single dispatch thread, so implementations
/// are not required to be `Send` or `Sync`.
pub trait EventLoop {
    /// Register `callback` for `fd`. Exactly one callback per descriptor;
    /// the callback is invoked whenever the descriptor matches `interest`.
    fn add_handler(&self, fd: RawFd, interest: Interest, callback: IoCallback);

    /// Deregister `fd`. Safe to call once per active registration, including
    /// from inside the descriptor's own callback.
    fn remove_handler(&self, fd: RawFd);
}
