use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
};

use crate::{MuxError, Result};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 9000;

/// Bytes read from a peer per `read` call.
pub const DEFAULT_READ_BUF_LEN: usize = 1024;

/// Capacity of the readiness batch filled by one wait.
pub const DEFAULT_MAX_EVENTS: usize = 64;

/// [`EventLoop`](crate::EventLoop) settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxConfig {
    /// Listening addresses, each one gets its own listener.
    pub laddrs: Vec<SocketAddr>,
    /// Pending connection queue length passed to `listen`.
    pub backlog: u32,
    /// Read buffer length used by each peer read.
    pub read_buf_len: usize,
    /// Maximum readiness entries returned by one wait.
    pub max_events: usize,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            laddrs: vec![SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT))],
            backlog: libc::SOMAXCONN as u32,
            read_buf_len: DEFAULT_READ_BUF_LEN,
            max_events: DEFAULT_MAX_EVENTS,
        }
    }
}

impl MuxConfig {
    /// Create config listening on loopback `port` with default settings.
    pub fn loopback(port: u16) -> Self {
        Self {
            laddrs: vec![SocketAddr::from((Ipv4Addr::LOCALHOST, port))],
            ..Default::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| {
            Err(MuxError::Socket(io::Error::new(
                io::ErrorKind::InvalidInput,
                msg.to_owned(),
            )))
        };

        if self.laddrs.is_empty() {
            return invalid("at least one listening address is required");
        }

        if self.read_buf_len == 0 {
            return invalid("read_buf_len must be greater than zero");
        }

        if self.max_events == 0 {
            return invalid("max_events must be greater than zero");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::MuxError;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = MuxConfig::default();

        assert_eq!(config.laddrs, vec!["127.0.0.1:9000".parse().unwrap()]);
        assert_eq!(config.read_buf_len, 1024);
        assert_eq!(config.max_events, 64);
        assert_eq!(config.backlog, libc::SOMAXCONN as u32);

        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_config() {
        let mut config = MuxConfig::loopback(0);
        config.read_buf_len = 0;

        assert!(matches!(config.validate(), Err(MuxError::Socket(_))));

        let mut config = MuxConfig::loopback(0);
        config.max_events = 0;

        assert!(matches!(config.validate(), Err(MuxError::Socket(_))));

        let mut config = MuxConfig::loopback(0);
        config.laddrs.clear();

        assert!(matches!(config.validate(), Err(MuxError::Socket(_))));
    }
}
