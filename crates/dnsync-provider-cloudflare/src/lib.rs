// # Cloudflare DNS Provider
//
// This crate provides the Cloudflare implementation of the dnsync
// `DnsProvider` capability set.
//
// - ✅ One logical API operation per call (list operations follow pagination)
// - ✅ 429 classified as `RateLimited`, other non-2xx as `RequestFailed`
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Dry-run mode for safe testing
// - ✅ Raw response logging behind the debug flag
// - ❌ NO retry logic (a failed call fails the enclosing domain for this cycle)
// - ❌ NO caching (zones and records are re-read every cycle)
//
// ## Security Requirements
//
// - API token NEVER appears in logs
// - Provider MUST fail fast if token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - Verify Token: GET `/user/tokens/verify`
// - List Zones: GET `/zones`
// - List DNS Records: GET `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`

use async_trait::async_trait;
use dnsync_core::config::DdnsConfig;
use dnsync_core::traits::{DnsProvider, DnsRecord, RecordPayload, Zone};
use dnsync_core::{Error, ProviderError, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const ZONES_PER_PAGE: u32 = 50;
const RECORDS_PER_PAGE: u32 = 100;

/// Longest error body echoed into a `RequestFailed` message
const MAX_ERROR_TEXT: usize = 256;

/// Cloudflare response envelope: `{"result": ..., "result_info": {...}}`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TokenStatus {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

/// Cloudflare DNS provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (token check, zone list, record list)
/// - Log the intended PUT/POST payload
/// - **NOT** actually modify DNS records
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API base URL, overridable for tests
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip writes
    dry_run: bool,

    /// Log raw response bodies at debug level
    debug: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .field("debug", &self.debug)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:Read and DNS:Edit permissions
    /// - `dry_run`: If true, perform GET requests but skip writes
    pub fn new(api_token: impl Into<String>, dry_run: bool) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_token,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
            debug: false,
        })
    }

    /// Create a provider from the daemon configuration
    pub fn from_config(config: &DdnsConfig) -> Result<Self> {
        if config.dry_run {
            tracing::warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
        }

        Ok(Self::new(config.api_token.clone(), config.dry_run)?.with_debug(config.debug))
    }

    /// Point the provider at another API root (no trailing slash)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Enable raw response logging
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Send one request and decode the envelope
    async fn request<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        operation: &str,
    ) -> std::result::Result<Envelope<T>, ProviderError> {
        let response = request
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("{operation}: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(format!("{operation}: {e}")))?;

        if self.debug {
            tracing::debug!("Cloudflare {} response ({}): {}", operation, status, body);
        }

        decode(status, &body)
    }

    /// GET every page of a list endpoint
    async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        per_page: u32,
        operation: &str,
    ) -> std::result::Result<Vec<T>, ProviderError> {
        let url = format!("{}{}", self.base_url, path);

        collect_pages(|page| {
            let request = self
                .client
                .get(&url)
                .query(&[("page", page), ("per_page", per_page)]);
            self.request(request, operation)
        })
        .await
    }
}

fn records_path(zone_id: &str) -> String {
    format!("/zones/{zone_id}/dns_records")
}

/// Fetch pages starting at 1 until `result_info.total_pages` is reached
///
/// A page without `result_info` is the last one.
async fn collect_pages<T, F, Fut>(mut fetch: F) -> std::result::Result<Vec<T>, ProviderError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<Envelope<Vec<T>>, ProviderError>>,
{
    let mut items = Vec::new();
    let mut page = 1;

    loop {
        let envelope = fetch(page).await?;
        items.extend(envelope.result);

        let total_pages = envelope
            .result_info
            .and_then(|info| info.total_pages)
            .unwrap_or(1);
        if page >= total_pages {
            return Ok(items);
        }
        page += 1;
    }
}

/// Classify a status and decode a success body
fn decode<T: DeserializeOwned>(
    status: u16,
    body: &str,
) -> std::result::Result<Envelope<T>, ProviderError> {
    if !(200..300).contains(&status) {
        return Err(ProviderError::from_status(status, error_text(body)));
    }

    serde_json::from_str(body).map_err(|e| ProviderError::Decode(e.to_string()))
}

/// Human-readable error text from a Cloudflare error body
fn error_text(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body)
        && !parsed.errors.is_empty()
    {
        return parsed
            .errors
            .iter()
            .map(|e| match e.code {
                Some(code) => format!("{} ({})", e.message, code),
                None => e.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ");
    }

    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_TEXT) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn verify_credential(&self) -> bool {
        let url = format!("{}/user/tokens/verify", self.base_url);

        match self
            .request::<TokenStatus>(self.client.get(&url), "verify token")
            .await
        {
            Ok(envelope) if envelope.result.status == "active" => true,
            Ok(envelope) => {
                tracing::warn!("Cloudflare token status is '{}'", envelope.result.status);
                false
            }
            Err(e) => {
                tracing::warn!("Cloudflare token verification failed: {}", e);
                false
            }
        }
    }

    async fn list_zones(&self) -> std::result::Result<Vec<Zone>, ProviderError> {
        self.list_all("/zones", ZONES_PER_PAGE, "list zones").await
    }

    async fn list_records(
        &self,
        zone_id: &str,
    ) -> std::result::Result<Vec<DnsRecord>, ProviderError> {
        self.list_all(&records_path(zone_id), RECORDS_PER_PAGE, "list records")
            .await
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        payload: &RecordPayload,
    ) -> std::result::Result<DnsRecord, ProviderError> {
        let url = format!("{}{}/{}", self.base_url, records_path(zone_id), record_id);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PUT request to {} with payload: {}",
                url,
                serde_json::to_string(payload).unwrap_or_default()
            );
            return Ok(synthesized(record_id, payload));
        }

        let envelope: Envelope<DnsRecord> = self
            .request(self.client.put(&url).json(payload), "update record")
            .await?;
        Ok(envelope.result)
    }

    async fn create_record(
        &self,
        zone_id: &str,
        payload: &RecordPayload,
    ) -> std::result::Result<DnsRecord, ProviderError> {
        let url = format!("{}{}", self.base_url, records_path(zone_id));

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST request to {} with payload: {}",
                url,
                serde_json::to_string(payload).unwrap_or_default()
            );
            return Ok(synthesized("dry-run", payload));
        }

        let envelope: Envelope<DnsRecord> = self
            .request(self.client.post(&url).json(payload), "create record")
            .await?;
        Ok(envelope.result)
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Record the provider would have returned for a write
fn synthesized(record_id: &str, payload: &RecordPayload) -> DnsRecord {
    DnsRecord {
        id: record_id.to_string(),
        name: payload.name.clone(),
        record_type: payload.record_type.clone(),
        content: payload.content.clone(),
        proxied: payload.proxied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token_rejected() {
        let result = CloudflareProvider::new("", false);
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_from_config_carries_flags() {
        let mut config = DdnsConfig::new("token", "example.com", "* * * * *");
        config.dry_run = true;
        config.debug = true;

        let provider = CloudflareProvider::from_config(&config).unwrap();
        assert!(provider.dry_run);
        assert!(provider.debug);
        assert_eq!(provider.base_url, CLOUDFLARE_API_BASE);
    }

    #[test]
    fn test_api_token_not_exposed_in_debug() {
        let provider = CloudflareProvider::new("secret_token_12345", false).unwrap();

        let debug_str = format!("{:?}", provider);
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("CloudflareProvider"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider = CloudflareProvider::new("token", false)
            .unwrap()
            .with_base_url("http://127.0.0.1:8080/client/v4/");
        assert_eq!(provider.base_url, "http://127.0.0.1:8080/client/v4");
    }

    #[test]
    fn test_decode_zone_list() {
        let body = r#"{
            "success": true,
            "result": [{"id": "023e105f4ecef8ad9ca31a8372d0c353", "name": "example.com", "status": "active"}],
            "result_info": {"page": 1, "per_page": 50, "count": 1, "total_count": 1, "total_pages": 1}
        }"#;

        let envelope: Envelope<Vec<Zone>> = decode(200, body).unwrap();
        assert_eq!(envelope.result[0].name, "example.com");
        assert_eq!(envelope.result_info.unwrap().total_pages, Some(1));
    }

    #[test]
    fn test_decode_record_result() {
        let body = r#"{
            "success": true,
            "result": {"id": "372e6795", "name": "a.example.com", "type": "A",
                       "content": "203.0.113.5", "proxied": true, "ttl": 1}
        }"#;

        let envelope: Envelope<DnsRecord> = decode(200, body).unwrap();
        assert_eq!(envelope.result.content, "203.0.113.5");
        assert!(envelope.result.proxied);
    }

    #[test]
    fn test_decode_429_is_rate_limited() {
        let result = decode::<Vec<Zone>>(429, r#"{"success":false,"errors":[]}"#);
        assert_eq!(result.unwrap_err(), ProviderError::RateLimited { status: 429 });
    }

    #[test]
    fn test_decode_other_failure_carries_status_and_message() {
        let body = r#"{"success":false,"errors":[{"code":9109,"message":"Invalid access token"}]}"#;

        let err = decode::<Vec<Zone>>(403, body).unwrap_err();
        assert_eq!(
            err,
            ProviderError::RequestFailed {
                status: 403,
                message: "Invalid access token (9109)".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_malformed_success_body() {
        let err = decode::<Vec<Zone>>(200, "<html>oops</html>").unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[test]
    fn test_error_text_truncates_plain_bodies() {
        let body = "x".repeat(MAX_ERROR_TEXT + 10);
        let text = error_text(&body);
        assert!(text.ends_with("..."));
        assert_eq!(text.len(), MAX_ERROR_TEXT + 3);
    }

    fn zone_page(page: u32, total_pages: u32) -> String {
        format!(
            r#"{{"success": true,
                "result": [{{"id": "zone-{page}", "name": "example{page}.com"}}],
                "result_info": {{"page": {page}, "per_page": 1, "total_pages": {total_pages}}}}}"#
        )
    }

    #[tokio::test]
    async fn test_pagination_follows_total_pages() {
        let mut requested = Vec::new();

        let zones: Vec<Zone> = collect_pages(|page| {
            requested.push(page);
            let body = zone_page(page, 3);
            async move { decode(200, &body) }
        })
        .await
        .unwrap();

        assert_eq!(requested, vec![1, 2, 3]);
        let names: Vec<&str> = zones.iter().map(|z| z.name.as_str()).collect();
        assert_eq!(names, vec!["example1.com", "example2.com", "example3.com"]);
    }

    #[tokio::test]
    async fn test_missing_result_info_is_single_page() {
        let mut requested = Vec::new();

        let records: Vec<DnsRecord> = collect_pages(|page| {
            requested.push(page);
            async {
                decode(
                    200,
                    r#"{"success": true, "result": [
                        {"id": "r1", "name": "a.example.com", "type": "A", "content": "203.0.113.5"}
                    ]}"#,
                )
            }
        })
        .await
        .unwrap();

        assert_eq!(requested, vec![1]);
        assert_eq!(records.len(), 1);
        assert!(!records[0].proxied);
    }

    #[tokio::test]
    async fn test_failed_later_page_fails_whole_listing() {
        let result: std::result::Result<Vec<Zone>, ProviderError> = collect_pages(|page| {
            let (status, body) = match page {
                1 => (200, zone_page(1, 2)),
                _ => (429, String::new()),
            };
            async move { decode(status, &body) }
        })
        .await;

        assert_eq!(result.unwrap_err(), ProviderError::RateLimited { status: 429 });
    }

    #[test]
    fn test_records_path() {
        assert_eq!(records_path("023e105f"), "/zones/023e105f/dns_records");
    }

    #[tokio::test]
    async fn test_dry_run_skips_writes() {
        // Unroutable base URL: any real request would fail
        let provider = CloudflareProvider::new("token", true)
            .unwrap()
            .with_base_url("http://127.0.0.1:1");
        let payload = RecordPayload::address("a.example.com", "203.0.113.5", true);

        let created = provider.create_record("zone", &payload).await.unwrap();
        assert_eq!(created.content, "203.0.113.5");

        let updated = provider.update_record("zone", "rec-1", &payload).await.unwrap();
        assert_eq!(updated.id, "rec-1");
        assert!(updated.proxied);
    }

    #[tokio::test]
    async fn test_transport_failure_means_inactive_credential() {
        let provider = CloudflareProvider::new("token", false)
            .unwrap()
            .with_base_url("http://127.0.0.1:1");

        assert!(!provider.verify_credential().await);
        assert!(matches!(
            provider.list_zones().await,
            Err(ProviderError::Transport(_))
        ));
    }
}
