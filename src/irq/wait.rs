use std::time::Duration;

use log::{debug, warn};

use super::{wait_for_edge, WaitOutcome};
use crate::{errors::Result, pin::Pin, Error};

impl Pin {
    /// Block until the armed edge occurs or `timeout` elapses, then read the
    /// level.
    ///
    /// `None` waits indefinitely and `Some(Duration::ZERO)` only checks for a
    /// pending edge. A timeout is reported as [`WaitOutcome::TimedOut`], not
    /// as an error. If polling fails the value descriptor is dropped.
    pub fn timed_wait(&mut self, timeout: Option<Duration>) -> Result<WaitOutcome> {
        self.ensure_valid()?;

        let polled = wait_for_edge(self.value_fd()?, timeout);
        let ready = match polled {
            Ok(ready) => ready,
            Err(errno) => {
                warn!("gpio{}: wait for irq failed: {errno}", self.number());
                self.discard_value_fd();
                return Err(Error::io(self.number(), "poll value", errno.into()));
            }
        };

        if !ready {
            debug!("gpio{}: wait timed out", self.number());
            return Ok(WaitOutcome::TimedOut);
        }

        self.get_value().map(WaitOutcome::Edge)
    }

    /// Block until the armed edge occurs, then read the level.
    pub fn wait(&mut self) -> Result<WaitOutcome> {
        self.timed_wait(None)
    }
}
