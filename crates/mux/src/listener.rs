use std::{
    fmt::Debug,
    io, mem,
    net::SocketAddr,
    os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd},
};

use mio::{net::TcpListener, Token};

use crate::{drain, Multiplexer, MuxError, PeerConnection, Result};

/// The nonblocking listening socket of the event loop.
///
/// Created once at startup and kept open until the process exits.
pub struct Listener {
    token: Token,
    laddr: SocketAddr,
    socket: TcpListener,
}

impl Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Listener({:?}, laddr={})", self.token, self.laddr)
    }
}

impl Listener {
    /// Create a stream socket with `SO_REUSEADDR`, bind it to `laddr`, set it
    /// nonblocking and start listening with `backlog`.
    ///
    /// Binding with a port number of 0 will request that the OS assigns a port to this listener.
    /// The port allocated can be queried via the [`local_addr`](Listener::local_addr) method.
    pub fn bind_and_listen(laddr: SocketAddr, backlog: u32, token: Token) -> Result<Self> {
        let fd = new_socket(&laddr).map_err(MuxError::Socket)?;

        set_reuseaddr(fd.as_raw_fd()).map_err(MuxError::Socket)?;

        bind(fd.as_raw_fd(), &laddr).map_err(|err| MuxError::bind(laddr, err))?;

        let listener = std::net::TcpListener::from(fd);

        listener.set_nonblocking(true).map_err(MuxError::Socket)?;

        listen(listener.as_raw_fd(), backlog).map_err(|err| MuxError::bind(laddr, err))?;

        let laddr = listener.local_addr().map_err(MuxError::Socket)?;

        log::info!("{:?}, listening on {}, backlog={}", token, laddr, backlog);

        Ok(Self {
            token,
            laddr,
            socket: TcpListener::from_std(listener),
        })
    }

    pub fn token(&self) -> Token {
        self.token
    }

    /// Returns the local address that this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.laddr
    }

    /// Register the listener with `mux` under its own token.
    pub fn register(&mut self, mux: &Multiplexer) -> Result<()> {
        mux.register(&mut self.socket, self.token)
    }

    /// Accept pending connections until the listener would block.
    ///
    /// The returned iterator is lazy and ends at the first `WouldBlock`. Every
    /// yielded [`PeerConnection`] is already nonblocking; the caller must
    /// register it before the next wait. Any other accept error is yielded
    /// once as [`MuxError::Accept`] and ends the iteration.
    pub fn accept_all(&self) -> impl Iterator<Item = Result<PeerConnection>> + '_ {
        drain(|| self.socket.accept()).map(|incoming| {
            incoming
                .map(|(stream, raddr)| PeerConnection::new(stream, raddr))
                .map_err(MuxError::Accept)
        })
    }
}

fn cvt(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

fn new_socket(laddr: &SocketAddr) -> io::Result<OwnedFd> {
    let domain = match laddr {
        SocketAddr::V4(_) => libc::AF_INET,
        SocketAddr::V6(_) => libc::AF_INET6,
    };

    let fd = cvt(unsafe { libc::socket(domain, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0) })?;

    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn set_reuseaddr(fd: RawFd) -> io::Result<()> {
    let enable: libc::c_int = 1;

    cvt(unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &enable as *const _ as *const libc::c_void,
            mem::size_of_val(&enable) as libc::socklen_t,
        )
    })?;

    Ok(())
}

fn bind(fd: RawFd, laddr: &SocketAddr) -> io::Result<()> {
    match laddr {
        SocketAddr::V4(v4) => {
            let mut addr: libc::sockaddr_in = unsafe { mem::zeroed() };
            addr.sin_family = libc::AF_INET as libc::sa_family_t;
            addr.sin_port = v4.port().to_be();
            addr.sin_addr.s_addr = u32::from(*v4.ip()).to_be();

            cvt(unsafe {
                libc::bind(
                    fd,
                    &addr as *const _ as *const libc::sockaddr,
                    mem::size_of_val(&addr) as libc::socklen_t,
                )
            })?;
        }
        SocketAddr::V6(v6) => {
            let mut addr: libc::sockaddr_in6 = unsafe { mem::zeroed() };
            addr.sin6_family = libc::AF_INET6 as libc::sa_family_t;
            addr.sin6_port = v6.port().to_be();
            addr.sin6_addr.s6_addr = v6.ip().octets();
            addr.sin6_flowinfo = v6.flowinfo();
            addr.sin6_scope_id = v6.scope_id();

            cvt(unsafe {
                libc::bind(
                    fd,
                    &addr as *const _ as *const libc::sockaddr,
                    mem::size_of_val(&addr) as libc::socklen_t,
                )
            })?;
        }
    }

    Ok(())
}

fn listen(fd: RawFd, backlog: u32) -> io::Result<()> {
    let backlog = backlog.min(libc::c_int::MAX as u32) as libc::c_int;

    cvt(unsafe { libc::listen(fd, backlog) })?;

    Ok(())
}
