/*!
 * Event Loop Contract
 * Readiness-multiplexing collaborator consumed by the event sources
 */

mod traits;
mod types;

pub use traits::{EventLoop, IoCallback};
pub use types::{Interest, Ready};
