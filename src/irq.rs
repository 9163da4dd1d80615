//! Edge interrupt notification.
//!
//! A line armed with [`Pin::enable_irq`](crate::pin::Pin::enable_irq)
//! signals `POLLPRI` (and `POLLERR`) on its value descriptor when the
//! configured edge occurs. Reading the value from offset zero acknowledges it.
//!
//! Use [`Pin::timed_wait`](crate::pin::Pin::timed_wait) to block on a single
//! line, or an [`IrqMux`] to dispatch callbacks for many lines from a
//! background thread.

use std::{os::fd::BorrowedFd, time::Duration};

use nix::poll::{PollFd, PollFlags, PollTimeout};

use crate::pin::values::Level;

pub mod mux;
mod wait;

pub use mux::{IrqCallback, IrqMux, SharedPin};

/// Events that signal an edge on a sysfs value descriptor.
pub(crate) const IRQ_EVENTS: PollFlags = PollFlags::POLLPRI.union(PollFlags::POLLERR);

/// Result of waiting for an edge on one pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// An edge was signalled; the level read right after it.
    Edge(Level),
    /// The timeout elapsed without an edge.
    TimedOut,
}

impl WaitOutcome {
    pub const fn level(self) -> Option<Level> {
        match self {
            WaitOutcome::Edge(level) => Some(level),
            WaitOutcome::TimedOut => None,
        }
    }

    pub const fn is_timeout(self) -> bool {
        matches!(self, WaitOutcome::TimedOut)
    }
}

/// `None` waits forever; anything beyond `i32::MAX` ms is clamped.
pub(crate) fn poll_timeout(timeout: Option<Duration>) -> PollTimeout {
    match timeout {
        None => PollTimeout::NONE,
        Some(t) => i32::try_from(t.as_millis())
            .ok()
            .and_then(|ms| PollTimeout::try_from(ms).ok())
            .unwrap_or(PollTimeout::MAX),
    }
}

/// Returns true if `fd` reported an edge before the timeout.
pub(crate) fn wait_for_edge(
    fd: BorrowedFd<'_>,
    timeout: Option<Duration>,
) -> nix::Result<bool> {
    let pollfd = PollFd::new(fd, IRQ_EVENTS);
    Ok(nix::poll::poll(&mut [pollfd], poll_timeout(timeout))? > 0)
}
