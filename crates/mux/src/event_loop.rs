use std::{
    collections::HashMap,
    fmt::Debug,
    io::Write,
    net::SocketAddr,
    time::Duration,
};

use bytes::BytesMut;
use mio::Token;

use crate::{
    Listener, Multiplexer, MuxConfig, MuxError, PeerConnection, ReadOutcome, Readiness,
    ReadinessBatch, Result,
};

/// Lifecycle of an [`EventLoop`].
///
/// There is no clean shutdown: a running loop only stops on a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Initializing,
    Running,
    Terminated,
}

/// What a registered token stands for.
pub enum Source {
    Listener(Listener),
    Peer(PeerConnection),
}

/// Counters maintained by the event loop.
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    /// Connections accepted since startup.
    pub accepted: u64,
    /// Connections closed since startup.
    pub closed: u64,
    /// Peer payload bytes copied to the sink.
    pub bytes_read: u64,
    /// Connections currently registered.
    pub active: u64,
}

impl Debug for LoopStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "acc={}, cc={}, br={}, active={}",
            self.accepted, self.closed, self.bytes_read, self.active
        )
    }
}

/// Everything the dispatch of one readiness entry touches.
struct Dispatcher<W> {
    mux: Multiplexer,
    sources: HashMap<Token, Source>,
    next_token: usize,
    buf: BytesMut,
    read_buf_len: usize,
    stats: LoopStats,
    sink: W,
}

impl<W: Write> Dispatcher<W> {
    /// Tokens are never reused, a closed peer's token can not reach a new connection.
    fn next_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        token
    }

    fn dispatch(&mut self, token: Token, readiness: Readiness) -> Result<()> {
        log::trace!("{:?}, dispatch {:?}", token, readiness);

        let Some(source) = self.sources.get_mut(&token) else {
            log::trace!("{:?}, already closed, skip", token);
            return Ok(());
        };

        if readiness.is_defunct() {
            match source {
                // the listener lives as long as the process, closing it would stop accepting for good.
                Source::Listener(listener) => {
                    log::error!("{:?}, poll error {:?}, keep listening", listener, readiness);
                }
                Source::Peer(_) => {
                    log::error!("{:?}, poll error {:?}, close connection", token, readiness);

                    self.close(token);
                }
            }

            return Ok(());
        }

        match source {
            Source::Listener(listener) => {
                let incoming = listener.accept_all().collect::<Result<Vec<_>>>()?;

                for peer in incoming {
                    self.add_peer(peer)?;
                }
            }
            Source::Peer(peer) => {
                let outcome = peer.read_all(&mut self.buf, self.read_buf_len, &mut self.sink)?;

                self.stats.bytes_read += outcome.bytes() as u64;

                match outcome {
                    ReadOutcome::Drained { bytes } => {
                        log::debug!("{:?}, finished reading data, len={}", token, bytes);
                    }
                    ReadOutcome::Eof { bytes } => {
                        log::info!("{:?}, finished with connection, len={}", token, bytes);

                        self.close(token);
                    }
                    ReadOutcome::Failed { bytes, error } => {
                        log::error!("{:?}, read failed after len={}: {}", token, bytes, error);

                        self.close(token);
                    }
                }
            }
        }

        Ok(())
    }

    fn add_peer(&mut self, mut peer: PeerConnection) -> Result<()> {
        let token = self.next_token();

        peer.register(&self.mux, token)?;

        log::info!("{:?}, accepted new connection from {}", token, peer.peer_addr());

        self.sources.insert(token, Source::Peer(peer));

        self.stats.accepted += 1;
        self.stats.active += 1;

        Ok(())
    }

    /// Deregister and drop peer `token`. Listeners are never closed.
    fn close(&mut self, token: Token) {
        if !matches!(self.sources.get(&token), Some(Source::Peer(_))) {
            return;
        }

        if let Some(Source::Peer(mut peer)) = self.sources.remove(&token) {
            peer.deregister(&self.mux, token);

            self.stats.closed += 1;
            self.stats.active -= 1;

            log::debug!("{:?}, closed, {:?}", token, self.stats);
        }
    }
}

/// Single-threaded, edge-triggered accept and read loop.
///
/// Payload read from peers is written to `sink`, nothing is ever written back
/// to a peer.
pub struct EventLoop<W> {
    state: LoopState,
    batch: ReadinessBatch,
    laddrs: Vec<SocketAddr>,
    dispatcher: Dispatcher<W>,
}

impl<W: Write> EventLoop<W> {
    /// Create the multiplexer, then bind and register one listener per
    /// configured address.
    pub fn new(config: MuxConfig, sink: W) -> Result<Self> {
        config.validate()?;

        let mut dispatcher = Dispatcher {
            mux: Multiplexer::create()?,
            sources: HashMap::new(),
            next_token: 0,
            buf: BytesMut::with_capacity(config.read_buf_len),
            read_buf_len: config.read_buf_len,
            stats: LoopStats::default(),
            sink,
        };

        let mut laddrs = vec![];

        for laddr in &config.laddrs {
            let token = dispatcher.next_token();

            let mut listener = Listener::bind_and_listen(*laddr, config.backlog, token)?;

            listener.register(&dispatcher.mux)?;

            laddrs.push(listener.local_addr());

            dispatcher.sources.insert(token, Source::Listener(listener));
        }

        Ok(Self {
            state: LoopState::Initializing,
            batch: ReadinessBatch::with_capacity(config.max_events),
            laddrs,
            dispatcher,
        })
    }

    /// The actual bound addresses, in configuration order.
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.laddrs
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> LoopStats {
        self.dispatcher.stats
    }

    /// Number of open peer connections.
    pub fn peer_count(&self) -> usize {
        self.dispatcher
            .sources
            .values()
            .filter(|source| matches!(source, Source::Peer(_)))
            .count()
    }

    /// Returns true if `token` is still in the interest set.
    pub fn is_registered(&self, token: Token) -> bool {
        self.dispatcher.sources.contains_key(&token)
    }

    /// Tokens of the open peer connections.
    pub fn peer_tokens(&self) -> Vec<Token> {
        self.dispatcher
            .sources
            .iter()
            .filter(|(_, source)| matches!(source, Source::Peer(_)))
            .map(|(token, _)| *token)
            .collect()
    }

    pub fn sink(&self) -> &W {
        &self.dispatcher.sink
    }

    pub fn into_sink(self) -> W {
        self.dispatcher.sink
    }

    /// Wait once, then dispatch every entry of the batch in delivery order.
    ///
    /// Returns the number of entries handled. `None` waits forever. Any error
    /// is fatal and moves the loop to [`LoopState::Terminated`], after which
    /// every call returns [`MuxError::Terminated`].
    pub fn run_once(&mut self, timeout: Option<Duration>) -> Result<usize> {
        if self.state == LoopState::Terminated {
            return Err(MuxError::Terminated);
        }

        self.state = LoopState::Running;

        let result = self.poll_once(timeout);

        if result.is_err() {
            self.state = LoopState::Terminated;
        }

        result
    }

    /// Run until a fatal error occurs. Only returns with that error.
    pub fn run(&mut self) -> Result<()> {
        log::info!("event loop running, laddrs={:?}", self.laddrs);

        loop {
            self.run_once(None)?;
        }
    }

    fn poll_once(&mut self, timeout: Option<Duration>) -> Result<usize> {
        self.dispatcher.mux.wait(&mut self.batch, timeout)?;

        let mut handled = 0;

        for (token, readiness) in self.batch.iter() {
            self.dispatcher.dispatch(token, readiness)?;

            handled += 1;
        }

        Ok(handled)
    }
}
