use std::{
    fmt::Debug,
    io::{self, Read, Write},
    net::SocketAddr,
};

use bytes::BytesMut;
use mio::{net::TcpStream, Token};

use crate::{drain, Multiplexer, MuxError, Result};

/// How a read drain of one peer ended.
#[derive(Debug)]
pub enum ReadOutcome {
    /// All currently available data was consumed, the connection stays open.
    Drained { bytes: usize },
    /// The peer performed an orderly shutdown.
    Eof { bytes: usize },
    /// The read failed with an error other than would block.
    Failed { bytes: usize, error: io::Error },
}

impl ReadOutcome {
    /// Bytes copied to the sink during this drain.
    pub fn bytes(&self) -> usize {
        match self {
            ReadOutcome::Drained { bytes }
            | ReadOutcome::Eof { bytes }
            | ReadOutcome::Failed { bytes, .. } => *bytes,
        }
    }

    /// Returns true if the connection has to be closed.
    pub fn is_closed(&self) -> bool {
        !matches!(self, ReadOutcome::Drained { .. })
    }
}

/// An accepted, nonblocking peer connection.
pub struct PeerConnection {
    stream: TcpStream,
    raddr: SocketAddr,
}

impl Debug for PeerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PeerConnection(raddr={})", self.raddr)
    }
}

impl PeerConnection {
    /// Wrap an accepted stream. mio accepts with `SOCK_NONBLOCK`, so the
    /// stream is nonblocking from the start.
    pub(crate) fn new(stream: TcpStream, raddr: SocketAddr) -> Self {
        Self { stream, raddr }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.raddr
    }

    pub fn register(&mut self, mux: &Multiplexer, token: Token) -> Result<()> {
        mux.register(&mut self.stream, token)
    }

    /// Deregister from `mux`, the descriptor is closed when `self` is dropped.
    pub fn deregister(&mut self, mux: &Multiplexer, token: Token) {
        if let Err(err) = mux.deregister(&mut self.stream, token) {
            log::trace!("{:?}, deregister failed: {}", token, err);
        }
    }

    /// Read until the peer would block, reached eof or failed, copying every
    /// chunk to `sink` as it arrives.
    ///
    /// Each read is bounded by `read_buf_len`; `buf` is scratch space reused
    /// across calls. Only a failing `sink` is returned as an error.
    pub fn read_all<W: Write>(
        &mut self,
        buf: &mut BytesMut,
        read_buf_len: usize,
        sink: &mut W,
    ) -> Result<ReadOutcome> {
        let raddr = self.raddr;
        let stream = &mut self.stream;

        let reads = drain(|| {
            buf.clear();
            buf.resize(read_buf_len, 0);

            let read_size = stream.read(&mut buf[..])?;

            buf.truncate(read_size);

            Ok(buf.split())
        });

        let mut bytes = 0;

        let mut outcome = None;

        for chunk in reads {
            match chunk {
                // Reading 0 bytes means the other side has closed the
                // connection or is done writing.
                Ok(chunk) if chunk.is_empty() => {
                    outcome = Some(ReadOutcome::Eof { bytes });
                    break;
                }
                Ok(chunk) => {
                    log::trace!("read data len({}) from {}", chunk.len(), raddr);

                    sink.write_all(&chunk).map_err(MuxError::Output)?;

                    bytes += chunk.len();
                }
                Err(error) => {
                    outcome = Some(ReadOutcome::Failed { bytes, error });
                    break;
                }
            }
        }

        sink.flush().map_err(MuxError::Output)?;

        Ok(outcome.unwrap_or(ReadOutcome::Drained { bytes }))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        io::{self, Write},
        mem,
        net::{Shutdown, SocketAddr},
        os::fd::AsRawFd,
        thread::sleep,
        time::Duration,
    };

    use bytes::BytesMut;
    use mio::net::{TcpListener, TcpStream};

    use crate::MuxError;

    use super::{PeerConnection, ReadOutcome};

    /// Close `stream` with a RST instead of a FIN.
    pub(crate) fn reset(stream: std::net::TcpStream) {
        let linger = libc::linger {
            l_onoff: 1,
            l_linger: 0,
        };

        let ret = unsafe {
            libc::setsockopt(
                stream.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_LINGER,
                &linger as *const _ as *const libc::c_void,
                mem::size_of_val(&linger) as libc::socklen_t,
            )
        };

        assert_eq!(ret, 0);
    }

    fn connected_pair() -> (PeerConnection, std::net::TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();

        let client = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();

        let (stream, raddr): (TcpStream, SocketAddr) = loop {
            match listener.accept() {
                Ok(incoming) => break incoming,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    sleep(Duration::from_millis(1))
                }
                Err(err) => panic!("accept failed: {err}"),
            }
        };

        (PeerConnection::new(stream, raddr), client)
    }

    #[test]
    fn test_read_all_chunks_and_eof() {
        _ = pretty_env_logger::try_init();

        let (mut peer, mut client) = connected_pair();

        let mut buf = BytesMut::new();
        let mut sink = vec![];

        let outcome = peer.read_all(&mut buf, 4, &mut sink).unwrap();

        assert!(matches!(outcome, ReadOutcome::Drained { bytes: 0 }));

        client.write_all(b"hello world").unwrap();
        client.shutdown(Shutdown::Write).unwrap();

        // loopback delivery is asynchronous, give the kernel a moment.
        sleep(Duration::from_millis(50));

        let outcome = peer.read_all(&mut buf, 4, &mut sink).unwrap();

        assert!(matches!(outcome, ReadOutcome::Eof { bytes: 11 }));
        assert!(outcome.is_closed());
        assert_eq!(sink, b"hello world");
    }

    #[test]
    fn test_read_all_reset_by_peer() {
        _ = pretty_env_logger::try_init();

        let (mut peer, mut client) = connected_pair();

        client.write_all(b"x").unwrap();

        reset(client);

        sleep(Duration::from_millis(50));

        let mut sink = vec![];

        let outcome = peer.read_all(&mut BytesMut::new(), 1024, &mut sink).unwrap();

        match outcome {
            ReadOutcome::Failed { bytes, ref error } => {
                assert_eq!(bytes, 1);
                assert_eq!(error.kind(), io::ErrorKind::ConnectionReset);
            }
            _ => panic!("expect failed outcome, got {:?}", outcome),
        }

        assert!(outcome.is_closed());
        assert_eq!(sink, b"x");
    }

    pub(crate) struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_read_all_sink_failure() {
        let (mut peer, mut client) = connected_pair();

        client.write_all(b"data").unwrap();

        sleep(Duration::from_millis(50));

        let err = peer
            .read_all(&mut BytesMut::new(), 1024, &mut BrokenSink)
            .unwrap_err();

        assert!(matches!(err, MuxError::Output(_)));
    }
}
