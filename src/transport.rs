//! Plain TCP transport.
//!
//! [`TcpConnectionFactory`] pools raw [`TcpStream`]s keyed by
//! [`ServerAddress`]. Protocol clients that run over TCP can wrap it, or use
//! it as a template for their own factory.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::error::{ConnectError, PoolError};
use crate::factory::ConnectionFactory;

/// A `host:port` server address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerAddress {
    host: String,
    port: u16,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ServerAddress {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| PoolError::InvalidEndpoint(format!("'{s}' has no port")))?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(PoolError::InvalidEndpoint(format!("'{s}' has no host")));
        }
        let port = port
            .parse()
            .map_err(|_| PoolError::InvalidEndpoint(format!("'{s}' has an invalid port")))?;
        Ok(Self::new(host, port))
    }
}

/// Factory producing raw TCP connections.
#[derive(Debug, Clone)]
pub struct TcpConnectionFactory {
    connect_timeout: Duration,
    probe_timeout: Duration,
    nodelay: bool,
}

impl Default for TcpConnectionFactory {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_millis(10),
            nodelay: true,
        }
    }
}

impl TcpConnectionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout for establishing a connection.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set how long the liveness probe waits for the socket to report EOF.
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Enable or disable `TCP_NODELAY` on new connections.
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = enabled;
        self
    }
}

#[async_trait]
impl ConnectionFactory for TcpConnectionFactory {
    type Endpoint = ServerAddress;
    type Connection = TcpStream;

    async fn create(&self, endpoint: &ServerAddress) -> Result<TcpStream, ConnectError> {
        let connect = TcpStream::connect((endpoint.host(), endpoint.port()));
        let stream = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| ConnectError::Timeout(self.connect_timeout))??;
        stream.set_nodelay(self.nodelay)?;
        trace!(endpoint = %endpoint, "Opened TCP connection");
        Ok(stream)
    }

    async fn validate(&self, endpoint: &ServerAddress, connection: &TcpStream) -> bool {
        let mut buf = [0u8; 1];
        match tokio::time::timeout(self.probe_timeout, connection.peek(&mut buf)).await {
            // Nothing to read and no EOF: the peer is still there.
            Err(_) => true,
            Ok(Ok(0)) => {
                debug!(endpoint = %endpoint, "Peer closed pooled connection");
                false
            }
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(endpoint = %endpoint, error = %e, "Pooled connection failed probe");
                false
            }
        }
    }

    async fn destroy(&self, endpoint: &ServerAddress, mut connection: TcpStream) {
        if let Err(e) = connection.shutdown().await {
            trace!(endpoint = %endpoint, error = %e, "Error shutting down TCP connection");
        }
    }
}
