use bitmask_enum::bitmask;
use mio::{event::Event, Events, Token};

/// Condition reported for one descriptor in a readiness batch.
#[bitmask(u8)]
pub enum Readiness {
    Readable,
    Error,
    Hangup,
}

impl Readiness {
    /// Returns true if the descriptor can no longer be used: an error or
    /// hangup was reported, or the entry is not readable at all.
    ///
    /// Hangup is treated the same as error, including an orderly close from
    /// both sides.
    pub fn is_defunct(&self) -> bool {
        self.intersects(Readiness::Error | Readiness::Hangup) || !self.contains(Readiness::Readable)
    }
}

impl From<&Event> for Readiness {
    fn from(event: &Event) -> Self {
        let mut readiness = Readiness::none();

        if event.is_readable() {
            readiness |= Readiness::Readable;
        }

        if event.is_error() {
            readiness |= Readiness::Error;
        }

        // both halves closed, `EPOLLHUP`.
        if event.is_read_closed() && event.is_write_closed() {
            readiness |= Readiness::Hangup;
        }

        readiness
    }
}

/// Reusable buffer of readiness entries filled by one
/// [`Multiplexer::wait`](crate::Multiplexer::wait).
pub struct ReadinessBatch {
    events: Events,
}

impl ReadinessBatch {
    /// Create batch holding up to `capacity` entries per wait.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Events::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.events.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterate entries in the order delivered by the os.
    pub fn iter(&self) -> impl Iterator<Item = (Token, Readiness)> + '_ {
        self.events
            .iter()
            .map(|event| (event.token(), Readiness::from(event)))
    }

    pub(crate) fn events_mut(&mut self) -> &mut Events {
        &mut self.events
    }
}
