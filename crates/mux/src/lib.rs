//! Single-threaded, edge-triggered tcp connection multiplexer.
//!
//! One [`EventLoop`] owns the listening sockets and every accepted peer. Each
//! wake-up of the [`Multiplexer`] is drained completely: listeners are accepted
//! until they would block, peers are read until they would block, reach eof or
//! fail. Peer payload is copied to the loop's output sink.

mod error;
pub use error::*;

mod config;
pub use config::*;

mod readiness;
pub use readiness::*;

mod drain;
pub use drain::*;

mod poller;
pub use poller::*;

mod listener;
pub use listener::*;

mod peer;
pub use peer::*;

mod event_loop;
pub use event_loop::*;

pub use mio::Token;
