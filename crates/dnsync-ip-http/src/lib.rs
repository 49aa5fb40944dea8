// # HTTP IP Source
//
// This crate resolves the host's public IPv4 address through an HTTP
// trace service.
//
// ## Architecture
//
// One GET per call against a trace endpoint that answers with
// `key=value` lines (Cloudflare's `/cdn-cgi/trace` format). The `ip=`
// line carries the address the request came from.
//
// The client binds an IPv4 local address so a dual-stack host still
// reports its IPv4 egress. Records written by the reconciler are `A`
// records, so an IPv6 answer is treated as a resolution failure.
//
// No caching: the engine resolves once per cycle and expects a fresh
// answer each time.

use dnsync_core::traits::IpSource;
use dnsync_core::{Error, Result};

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Default trace endpoint
pub const DEFAULT_TRACE_URL: &str = "https://one.one.one.one/cdn-cgi/trace";

/// HTTP timeout for a single trace request
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP-based public IP source
#[derive(Debug)]
pub struct HttpIpSource {
    /// Trace endpoint URL
    url: String,

    /// HTTP client bound to IPv4
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a source against the default trace endpoint
    pub fn new() -> Result<Self> {
        Self::with_url(DEFAULT_TRACE_URL)
    }

    /// Create a source against a custom trace endpoint
    pub fn with_url(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_trace(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::ip_resolution(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::ip_resolution(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| Error::ip_resolution(format!("Failed to read response: {e}")))
    }
}

/// Extract the `ip=` value from a trace body
///
/// Returns `None` when the line is missing or does not hold an IP address.
pub fn parse_trace(body: &str) -> Option<IpAddr> {
    body.lines()
        .filter_map(|line| line.trim().strip_prefix("ip="))
        .next()
        .and_then(|value| value.trim().parse().ok())
}

/// Accept only IPv4 answers
fn require_ipv4(ip: IpAddr) -> Result<IpAddr> {
    match ip {
        IpAddr::V4(_) => Ok(ip),
        IpAddr::V6(_) => Err(Error::ip_resolution(format!("Expected IPv4, got: {ip}"))),
    }
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    async fn current(&self) -> Result<IpAddr> {
        let body = self.fetch_trace().await?;

        let ip = parse_trace(&body)
            .ok_or_else(|| Error::ip_resolution("Trace response has no valid ip= line"))?;
        let ip = require_ipv4(ip)?;

        tracing::debug!("Resolved public IP {} via {}", ip, self.url);
        Ok(ip)
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
