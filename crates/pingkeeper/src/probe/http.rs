//! HTTP liveness probing

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::redirect::Policy;
use tracing::debug;
use url::Url;

use super::{Probe, ProbeKind};
use crate::error::ConfigError;
use crate::process::elapsed_ms;
use crate::result::ProbeResult;

/// Sends a HEAD request and reports the status code.
///
/// Transport failures (DNS, refused, timeout, TLS) are returned as a message.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn head(&self, url: &Url) -> Result<u16, String>;
}

/// [`HttpTransport`] backed by a reqwest client. Redirects are not followed,
/// so a 3xx answer counts as alive.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn head(&self, url: &Url) -> Result<u16, String> {
        let response = self.client.head(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                format!("HTTP request timed out: {e}")
            } else {
                format!("HTTP request failed: {e}")
            }
        })?;

        Ok(response.status().as_u16())
    }
}

/// Parse an http(s) URL. Any other scheme is a configuration error.
pub(crate) fn parse_http_url(target: &str) -> Result<Url, ConfigError> {
    if let Some((scheme, _)) = target.split_once("://") {
        let scheme = scheme.to_ascii_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(ConfigError::UnsupportedScheme(scheme));
        }
    }

    let url = Url::parse(target).map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl("URL must have a valid host".to_string()));
    }

    Ok(url)
}

/// HEAD probe. Success means a status in `200..400`.
pub struct HttpProbe {
    target: String,
    /// Resolved once; a bad URL fails every check without touching the network
    url: Result<Url, ConfigError>,
    transport: Arc<dyn HttpTransport>,
}

impl HttpProbe {
    pub fn new(target: impl Into<String>, timeout: Duration) -> Result<Self, ConfigError> {
        let transport = Arc::new(ReqwestTransport::new(timeout)?);
        Ok(Self::with_transport(target, transport))
    }

    pub fn with_transport(target: impl Into<String>, transport: Arc<dyn HttpTransport>) -> Self {
        let target = target.into();
        let url = parse_http_url(&target);
        Self { target, url, transport }
    }

    /// The parsed URL, or the configuration error every check will report
    pub fn url(&self) -> Result<&Url, &ConfigError> {
        self.url.as_ref()
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self) -> ProbeResult {
        let url = match &self.url {
            Ok(url) => url,
            Err(config_error) => return ProbeResult::failure(0.0, config_error.to_string()),
        };

        debug!("HTTP probe sending HEAD {}", url);
        let start = Instant::now();
        let outcome = self.transport.head(url).await;
        let latency = elapsed_ms(start, Instant::now());

        match outcome {
            Ok(status) if (200..400).contains(&status) => {
                debug!("HTTP probe to {} answered {} in {:.2}ms", url, status, latency);
                ProbeResult::success(latency)
            }
            Ok(status) => {
                debug!("HTTP probe to {} answered {}", url, status);
                ProbeResult::failure(latency, format!("HTTP status: {status}"))
            }
            Err(message) => {
                debug!("HTTP probe to {} failed: {}", url, message);
                ProbeResult::failure(latency, message)
            }
        }
    }

    fn kind(&self) -> ProbeKind {
        ProbeKind::Http
    }

    fn target(&self) -> &str {
        &self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct StubTransport {
        calls: AtomicUsize,
        last_url: Mutex<Option<String>>,
        response: Result<u16, String>,
    }

    impl StubTransport {
        fn new(response: Result<u16, String>) -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), last_url: Mutex::new(None), response })
        }
    }

    #[async_trait]
    impl HttpTransport for StubTransport {
        async fn head(&self, url: &Url) -> Result<u16, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_url.lock().unwrap() = Some(url.to_string());
            self.response.clone()
        }
    }

    #[tokio::test]
    async fn test_unsupported_scheme_never_touches_network() {
        let transport = StubTransport::new(Ok(200));
        let probe = HttpProbe::with_transport("ftp://example.com", transport.clone());

        for _ in 0..3 {
            let result = probe.check().await;
            assert!(!result.success);
            assert_eq!(result.error.as_deref(), Some("Unsupported protocol: ftp"));
        }
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_status_ranges() {
        let cases =
            [(200, true), (204, true), (301, true), (399, true), (404, false), (503, false)];
        for (status, expected) in cases {
            let probe =
                HttpProbe::with_transport("http://example.com", StubTransport::new(Ok(status)));
            let result = probe.check().await;
            assert_eq!(result.success, expected, "status {status}");
            if !expected {
                assert_eq!(result.error, Some(format!("HTTP status: {status}")));
            }
        }
    }

    #[tokio::test]
    async fn test_default_path_is_root() {
        let transport = StubTransport::new(Ok(200));
        let probe = HttpProbe::with_transport("https://example.com", transport.clone());
        probe.check().await;

        assert_eq!(transport.last_url.lock().unwrap().as_deref(), Some("https://example.com/"));
    }

    #[test]
    fn test_url_resolved_once_at_construction() {
        let probe =
            HttpProbe::with_transport("https://example.com/health", StubTransport::new(Ok(200)));
        assert_eq!(probe.url().map(Url::as_str), Ok("https://example.com/health"));

        let probe = HttpProbe::with_transport("ftp://example.com", StubTransport::new(Ok(200)));
        assert_eq!(probe.url().unwrap_err(), &ConfigError::UnsupportedScheme("ftp".to_string()));
    }

    #[tokio::test]
    async fn test_transport_error_is_reported() {
        let transport = StubTransport::new(Err("HTTP request failed: dns error".to_string()));
        let probe = HttpProbe::with_transport("http://nowhere.invalid", transport);
        let result = probe.check().await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("HTTP request failed: dns error"));
    }

    #[test]
    fn test_parse_http_url() {
        assert!(parse_http_url("http://example.com").is_ok());
        assert!(parse_http_url("HTTPS://example.com/health").is_ok());
        assert_eq!(
            parse_http_url("gopher://example.com").unwrap_err(),
            ConfigError::UnsupportedScheme("gopher".to_string())
        );
        assert!(matches!(parse_http_url("http://"), Err(ConfigError::InvalidUrl(_))));
    }

    async fn serve_once(status_line: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                );
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });

        port
    }

    #[tokio::test]
    async fn test_reqwest_transport_against_local_server() {
        let port = serve_once("204 No Content").await;
        let probe =
            HttpProbe::new(format!("http://127.0.0.1:{port}/"), Duration::from_secs(2)).unwrap();

        let result = probe.check().await;
        assert!(result.success, "expected success: {result:?}");
    }

    #[tokio::test]
    async fn test_reqwest_transport_reports_server_error() {
        let port = serve_once("503 Service Unavailable").await;
        let probe =
            HttpProbe::new(format!("http://127.0.0.1:{port}/"), Duration::from_secs(2)).unwrap();

        let result = probe.check().await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("HTTP status: 503"));
    }
}
