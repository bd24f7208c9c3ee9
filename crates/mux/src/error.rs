use std::{io, net::SocketAddr};

use mio::Token;

/// Errors that stop the whole event loop.
///
/// Failures that belong to a single peer never show up here, they are
/// reported through [`ReadOutcome`](crate::ReadOutcome) and handled inside the loop.
#[derive(thiserror::Error, Debug)]
pub enum MuxError {
    #[error("bind {laddr} failed: {source}")]
    Bind {
        laddr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("socket setup failed: {0}")]
    Socket(#[source] io::Error),

    #[error("create poller failed: {0}")]
    Poller(#[source] io::Error),

    #[error("register {token:?} with poller failed: {source}")]
    Register {
        token: Token,
        #[source]
        source: io::Error,
    },

    #[error("wait for readiness events failed: {0}")]
    Wait(#[source] io::Error),

    #[error("accept incoming connection failed: {0}")]
    Accept(#[source] io::Error),

    #[error("write peer data to output failed: {0}")]
    Output(#[source] io::Error),

    #[error("event loop already terminated by a fatal error")]
    Terminated,
}

impl MuxError {
    /// Wrap a `bind`/`listen` failure, keeping address problems apart from
    /// resource problems.
    pub(crate) fn bind(laddr: SocketAddr, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::AddrInUse
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::PermissionDenied => MuxError::Bind { laddr, source: err },
            _ => MuxError::Socket(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, MuxError>;
