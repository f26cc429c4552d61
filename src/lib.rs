/*!
 * fdevent Library
 * Converts process signals and kernel timers into descriptor-based events
 * consumable by a single-threaded reactor (Linux signalfd/timerfd)
 */

pub mod events;
pub mod sources;

// Re-export public API
pub use events::{EventLoop, Interest, IoCallback, Ready};
pub use sources::{
    EventSource, Signal, Signaler, SourceError, SourceKind, SourceResult, Timer,
};
