/*!
 * Source Types
 * Source kinds and error types
 */

use nix::errno::Errno;
use std::fmt;
use thiserror::Error;

/// Source operation result
pub type SourceResult<T> = Result<T, SourceError>;

/// Event source errors.
///
/// Configuration failures leave the source permanently unconfigured; read
/// anomalies drop a single event and leave the source running. Neither is
/// surfaced to callers as a `Result` - both are reported through error-level
/// logs at the site that observed them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("failed to block signals: {0}")]
    BlockSignals(Errno),

    #[error("failed to open signalfd: {0}")]
    OpenSignalFd(Errno),

    #[error("failed to open timerfd: {0}")]
    OpenTimerFd(Errno),

    #[error("failed to arm timerfd: {0}")]
    ArmTimer(Errno),

    #[error("read on {kind} descriptor failed: {errno}")]
    ReadFailed { kind: SourceKind, errno: Errno },

    #[error("{kind} descriptor woke without a pending event")]
    EmptyRead { kind: SourceKind },

    #[error("short read on timer descriptor: {bytes} bytes")]
    ShortRead { bytes: usize },

    #[error("unexpected signal number {signo}")]
    UnexpectedSignal { signo: u32 },
}

/// Kind of descriptor-backed event source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// signalfd-backed signal source
    Signal,
    /// timerfd-backed timer source
    Timer,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Signal => write!(f, "signaler"),
            SourceKind::Timer => write!(f, "timer"),
        }
    }
}
