use std::net::{Ipv4Addr, SocketAddr};

use clap::Parser;
use edge_mux::{MuxConfig, DEFAULT_MAX_EVENTS, DEFAULT_PORT, DEFAULT_READ_BUF_LEN};

/// Accept tcp connections on loopback and copy everything peers send to stdout.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Listening addresses, may be repeated. Overrides `--port`.
    #[arg(long)]
    pub laddrs: Vec<SocketAddr>,

    /// Loopback port used when no `--laddrs` is given.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Listen backlog, defaults to the system maximum.
    #[arg(long)]
    pub backlog: Option<u32>,

    /// Bytes read from a peer per read call.
    #[arg(long, default_value_t = DEFAULT_READ_BUF_LEN)]
    pub read_buf_len: usize,

    /// Maximum readiness events handled per wake-up.
    #[arg(short, long, default_value_t = DEFAULT_MAX_EVENTS)]
    pub max_events: usize,

    /// Log filter, `RUST_LOG` takes precedence when set.
    #[arg(long, default_value = "info")]
    pub log_filter: String,
}

impl Args {
    /// Convert into event loop config.
    pub fn to_config(&self) -> MuxConfig {
        let laddrs = if self.laddrs.is_empty() {
            vec![SocketAddr::from((Ipv4Addr::LOCALHOST, self.port))]
        } else {
            self.laddrs.clone()
        };

        let default = MuxConfig::default();

        MuxConfig {
            laddrs,
            backlog: self.backlog.unwrap_or(default.backlog),
            read_buf_len: self.read_buf_len,
            max_events: self.max_events,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Args;

    #[test]
    fn test_default_args() {
        let config = Args::parse_from(["edge-muxd"]).to_config();

        assert_eq!(config, edge_mux::MuxConfig::default());
    }

    #[test]
    fn test_args_override() {
        let config = Args::parse_from([
            "edge-muxd",
            "--port",
            "9100",
            "--backlog",
            "32",
            "--read-buf-len",
            "16",
        ])
        .to_config();

        assert_eq!(config.laddrs, vec!["127.0.0.1:9100".parse().unwrap()]);
        assert_eq!(config.backlog, 32);
        assert_eq!(config.read_buf_len, 16);

        let config = Args::parse_from([
            "edge-muxd",
            "--port",
            "9100",
            "--laddrs",
            "127.0.0.1:9001",
            "--laddrs",
            "[::1]:9002",
        ])
        .to_config();

        assert_eq!(
            config.laddrs,
            vec![
                "127.0.0.1:9001".parse().unwrap(),
                "[::1]:9002".parse().unwrap()
            ]
        );
    }
}
