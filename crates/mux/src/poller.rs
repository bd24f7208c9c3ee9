use std::{io, time::Duration};

use mio::{event::Source, Interest, Poll, Token};

use crate::{interrupted, MuxError, ReadinessBatch, Result};

/// Readiness multiplexer, the os interest set of the event loop.
///
/// Every source is registered for read interest only. mio registrations are
/// edge-triggered, so the owner must drain a source on each notification.
pub struct Multiplexer {
    poll: Poll,
}

impl Multiplexer {
    /// Allocate the os interest set.
    pub fn create() -> Result<Self> {
        let poll = Poll::new().map_err(MuxError::Poller)?;

        log::trace!("Create multiplexer");

        Ok(Self { poll })
    }

    /// Add `source` to the interest set with key `token`.
    pub fn register<S>(&self, source: &mut S, token: Token) -> Result<()>
    where
        S: Source + ?Sized,
    {
        self.poll
            .registry()
            .register(source, token, Interest::READABLE)
            .map_err(|err| MuxError::Register { token, source: err })?;

        log::trace!("{:?}, register readable", token);

        Ok(())
    }

    /// Remove `source` from the interest set.
    ///
    /// Closing the descriptor removes it as well, so callers may ignore the error.
    pub fn deregister<S>(&self, source: &mut S, token: Token) -> io::Result<()>
    where
        S: Source + ?Sized,
    {
        self.poll.registry().deregister(source)?;

        log::trace!("{:?}, deregister", token);

        Ok(())
    }

    /// Block until at least one registered source is ready, or `timeout` elapsed.
    ///
    /// `None` waits forever. Entries are written into `batch`, replacing the
    /// previous content. `EINTR` is retried.
    pub fn wait(&mut self, batch: &mut ReadinessBatch, timeout: Option<Duration>) -> Result<()> {
        loop {
            match self.poll.poll(batch.events_mut(), timeout) {
                Ok(()) => return Ok(()),
                Err(ref err) if interrupted(err) => {
                    log::trace!("wait interrupted, retry immediately");
                    continue;
                }
                Err(err) => return Err(MuxError::Wait(err)),
            }
        }
    }
}
