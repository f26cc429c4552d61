/*!
 * Event Sources Module
 * Descriptor-backed event sources: signalfd-based Signaler, timerfd-based Timer
 */

mod signaler;
mod state;
mod timer;
pub mod traits;
pub mod types;

// Re-export public API
pub use nix::sys::signal::Signal;
pub use signaler::{SignalHandler, Signaler};
pub use timer::{Timer, TimerHandler};
pub use traits::EventSource;
pub use types::{SourceError, SourceKind, SourceResult};
