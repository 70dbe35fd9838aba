//! Channel configuration.

use std::time::Duration;

use dmc_common::{RemainderPolicy, TextEncoding};

/// Configuration for a delimited message channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Remote host name or IP address.
    pub host: String,
    /// Remote TCP port.
    pub port: u16,
    /// Encoding for outgoing text, incoming text and the delimiter.
    pub encoding: TextEncoding,
    /// Handling of bytes read past a delimiter.
    pub remainder: RemainderPolicy,
    /// Optional cap on payload bytes per message.
    pub max_message_size: Option<usize>,
    /// Optional TCP connect timeout, applied per resolved address.
    pub connect_timeout: Option<Duration>,
    /// Optional TCP read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
    /// Disable Nagle's algorithm on the socket.
    pub nodelay: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            encoding: TextEncoding::Ascii,
            remainder: RemainderPolicy::Discard,
            max_message_size: None,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            nodelay: true,
        }
    }
}

impl ChannelConfig {
    /// Default configuration for the given endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ChannelConfig {
            host: host.into(),
            port,
            ..ChannelConfig::default()
        }
    }

    /// Host as handed to the resolver. A bracketed IPv6 literal such as
    /// "[::1]" is unwrapped.
    pub fn resolve_host(&self) -> &str {
        self.host
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(&self.host)
    }

    /// Endpoint formatted for logs and errors, e.g. "127.0.0.1:9000" or
    /// "[::1]:9000".
    pub fn addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv6Addr, SocketAddr, ToSocketAddrs};

    use super::*;

    #[test]
    fn defaults_match_peer_expectations() {
        let config = ChannelConfig::default();
        assert_eq!(config.encoding, TextEncoding::Ascii);
        assert_eq!(config.remainder, RemainderPolicy::Discard);
        assert!(config.read_timeout.is_none());
        assert!(config.nodelay);
    }

    #[test]
    fn formats_ipv6_hosts_with_brackets() {
        assert_eq!(ChannelConfig::new("::1", 9000).addr(), "[::1]:9000");
        assert_eq!(ChannelConfig::new("localhost", 80).addr(), "localhost:80");
        assert_eq!(ChannelConfig::new("[::1]", 9000).addr(), "[::1]:9000");
    }

    #[test]
    fn bracketed_ipv6_hosts_resolve() {
        let config = ChannelConfig::new("[::1]", 9000);
        assert_eq!(config.resolve_host(), "::1");
        assert_eq!(ChannelConfig::new("::1", 9000).resolve_host(), "::1");
        assert_eq!(ChannelConfig::new("localhost", 80).resolve_host(), "localhost");

        let resolved: Vec<SocketAddr> = (config.resolve_host(), config.port)
            .to_socket_addrs()
            .expect("resolve")
            .collect();
        assert_eq!(resolved, vec![SocketAddr::from((Ipv6Addr::LOCALHOST, 9000))]);
    }
}
