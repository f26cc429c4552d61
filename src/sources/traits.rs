/*!
 * Source Traits
 * Common capability surface over descriptor-backed event sources
 */

use super::types::SourceKind;
use std::os::fd::RawFd;

/// Read-only view over a descriptor-backed event source.
///
/// Both variants share one configure -> start/stop -> dispatch shape; this
/// trait exposes the observable part of that shape.
pub trait EventSource {
    /// Which kind of source this is.
    fn kind(&self) -> SourceKind;

    /// The underlying descriptor; -1 when configuration failed.
    fn raw_fd(&self) -> RawFd;

    /// Whether the source is currently registered with an event loop.
    fn is_running(&self) -> bool;
}
