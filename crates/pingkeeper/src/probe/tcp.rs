//! TCP connect probing

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::{Probe, ProbeKind};
use crate::process::elapsed_ms;
use crate::result::ProbeResult;

/// Port used when the target does not name one
pub const DEFAULT_PORT: u16 = 80;

/// Probe that succeeds when a TCP connection can be established.
///
/// The connection is dropped as soon as it is open. Latency is the time the
/// connect attempt took, whether it succeeded or not.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    target: String,
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        let host = host.into();
        Self { target: format!("{host}:{port}"), host, port, timeout }
    }

    /// Accepts `host`, `host:port`, an IP literal or `[v6]:port`
    pub fn from_target(target: &str, timeout: Duration) -> Self {
        let (host, port) = split_host_port(target);
        Self { target: target.to_string(), host, port, timeout }
    }

    #[must_use]
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

fn split_host_port(target: &str) -> (String, u16) {
    if let Ok(addr) = target.parse::<SocketAddr>() {
        return (addr.ip().to_string(), addr.port());
    }
    if let Ok(ip) = target.parse::<IpAddr>() {
        return (ip.to_string(), DEFAULT_PORT);
    }
    if let Some((host, port)) = target.rsplit_once(':') {
        if !host.contains(':') {
            if let Ok(port) = port.parse::<u16>() {
                return (host.to_string(), port);
            }
        }
    }
    (target.trim_matches(['[', ']']).to_string(), DEFAULT_PORT)
}

#[async_trait]
impl Probe for TcpProbe {
    async fn check(&self) -> ProbeResult {
        let address = self.address();
        debug!("TCP probe connecting to {}", address);

        let start = Instant::now();
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        let outcome = timeout(self.timeout, connect).await;
        let latency = elapsed_ms(start, Instant::now());

        match outcome {
            Ok(Ok(_stream)) => {
                debug!("TCP probe to {} succeeded in {:.2}ms", address, latency);
                ProbeResult::success(latency)
            }
            Ok(Err(io_error)) => {
                debug!("TCP probe to {} failed: {}", address, io_error);
                ProbeResult::failure(
                    latency,
                    format!("TCP connection to {address} failed: {io_error}"),
                )
            }
            Err(_elapsed) => {
                debug!("TCP probe to {} timed out after {:?}", address, self.timeout);
                ProbeResult::failure(
                    latency,
                    format!("TCP connection to {address} timed out after {:?}", self.timeout),
                )
            }
        }
    }

    fn kind(&self) -> ProbeKind {
        ProbeKind::Socket
    }

    fn target(&self) -> &str {
        &self.target
    }
}
