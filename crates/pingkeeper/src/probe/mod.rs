//! Reachability probes
//!
//! A probe performs exactly one check against one target and reports the
//! outcome as a [`ProbeResult`]. Network trouble is data, not an error: a
//! refused connection, a timeout or a 503 all come back as
//! `ProbeResult { success: false, .. }`.
//!
//! ## Strategies
//!
//! - [`TcpProbe`]: TCP connect to `host:port` (port 80 unless given)
//! - [`HttpProbe`]: HEAD request, success on status 200..400
//! - [`ExternalPingProbe`]: one echo through an external ping utility
//!
//! The strategy is picked once by [`ProbeConfig`] and never re-evaluated.

pub mod http;
pub mod ping;
pub mod tcp;

pub use http::{HttpProbe, HttpTransport, ReqwestTransport};
pub use ping::{ExternalPingProbe, parse_latency_ms};
pub use tcp::TcpProbe;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::process::{Clock, ProcessRunner, SystemClock, TokioProcessRunner};
use crate::result::ProbeResult;

/// Which probe strategy a target resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Socket,
    Http,
    ExternalPing,
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeKind::Socket => write!(f, "socket"),
            ProbeKind::Http => write!(f, "http"),
            ProbeKind::ExternalPing => write!(f, "external-ping"),
        }
    }
}

/// A single reachability check
#[async_trait]
pub trait Probe: Send + Sync {
    /// Perform one check. Must honor the configured timeout and must not panic
    /// on network failure.
    async fn check(&self) -> ProbeResult;

    fn kind(&self) -> ProbeKind;

    /// Human readable target, used in logs and summaries
    fn target(&self) -> &str;
}

/// Per-target probe configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeConfig {
    target: String,
    timeout: Duration,
    payload_size: Option<u32>,
    kind: ProbeKind,
}

impl ProbeConfig {
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        let target = target.into().trim().to_string();
        let kind = resolve_kind(&target, None);
        Self { target, timeout, payload_size: None, kind }
    }

    /// Request an external ping with the given payload. This switches the
    /// strategy to [`ProbeKind::ExternalPing`] whatever the target looks like.
    #[must_use]
    pub fn with_payload_size(mut self, payload_size: u32) -> Self {
        self.payload_size = Some(payload_size);
        self.kind = resolve_kind(&self.target, self.payload_size);
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn payload_size(&self) -> Option<u32> {
        self.payload_size
    }

    pub fn kind(&self) -> ProbeKind {
        self.kind
    }

    /// Reject configurations that can never produce a meaningful check
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.is_empty() {
            return Err(ConfigError::EmptyTarget);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::NonPositiveTimeout);
        }
        if self.payload_size == Some(0) {
            return Err(ConfigError::ZeroPayloadSize);
        }
        if self.kind == ProbeKind::Http {
            http::parse_http_url(&self.target)?;
        }
        Ok(())
    }
}

fn resolve_kind(target: &str, payload_size: Option<u32>) -> ProbeKind {
    if payload_size.is_some() {
        ProbeKind::ExternalPing
    } else if target.contains("://") {
        ProbeKind::Http
    } else {
        ProbeKind::Socket
    }
}

/// Collaborators injected into the probes built by [`build_probe`]
#[derive(Clone)]
pub struct ProbeOptions {
    /// External ping utility, looked up on `PATH`
    pub ping_program: String,
    pub runner: Arc<dyn ProcessRunner>,
    pub clock: Arc<dyn Clock>,
    /// Overrides the reqwest transport when set
    pub http_transport: Option<Arc<dyn HttpTransport>>,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            ping_program: ping::DEFAULT_PING_PROGRAM.to_string(),
            runner: Arc::new(TokioProcessRunner),
            clock: Arc::new(SystemClock),
            http_transport: None,
        }
    }
}

impl fmt::Debug for ProbeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeOptions")
            .field("ping_program", &self.ping_program)
            .field("http_transport", &self.http_transport.is_some())
            .finish_non_exhaustive()
    }
}

/// Build the probe matching the resolved kind of `config`
pub fn build_probe(
    config: &ProbeConfig,
    options: &ProbeOptions,
) -> Result<Box<dyn Probe>, ConfigError> {
    match config.kind() {
        ProbeKind::Socket => Ok(Box::new(TcpProbe::from_target(config.target(), config.timeout()))),
        ProbeKind::Http => {
            let transport: Arc<dyn HttpTransport> = match &options.http_transport {
                Some(transport) => transport.clone(),
                None => Arc::new(ReqwestTransport::new(config.timeout())?),
            };
            Ok(Box::new(HttpProbe::with_transport(config.target(), transport)))
        }
        ProbeKind::ExternalPing => {
            let host = ping_host(config.target());
            let probe = ExternalPingProbe::new(host, config.timeout(), config.payload_size())
                .with_program(options.ping_program.clone())
                .with_runner(options.runner.clone())
                .with_clock(options.clock.clone());
            Ok(Box::new(probe))
        }
    }
}

/// The host part of a URL target, or the target itself
fn ping_host(target: &str) -> String {
    Url::parse(target)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| target.to_string())
}
