// # DNS Provider Trait
//
// Defines the capability set the reconciler consumes from a managed DNS
// provider, independent of transport.
//
// ## Implementations
//
// - Cloudflare: `dnsync-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use dnsync_core::DnsProvider;
//
// let zones = provider.list_zones().await?;
// let records = provider.list_records(&zones[0].id).await?;
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Record type written when a missing record is created
pub const ADDRESS_RECORD_TYPE: &str = "A";

/// A provider-managed DNS domain (e.g. `example.com`)
///
/// Fetched fresh every cycle; never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Provider-specific zone identifier
    pub id: String,
    /// Zone apex name
    pub name: String,
}

/// One record inside a zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Provider-specific record identifier
    pub id: String,
    /// Fully-qualified record name
    pub name: String,
    /// Record type (`A`, `AAAA`, `CNAME`, ...)
    #[serde(rename = "type")]
    pub record_type: String,
    /// Record content; the IP address for address records
    pub content: String,
    /// Provider routing flag
    #[serde(default)]
    pub proxied: bool,
}

/// Full record body sent on create and update
///
/// Updates replace the whole record, so every field is always sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayload {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub proxied: bool,
}

impl RecordPayload {
    /// Payload for a new address record
    pub fn address(name: impl Into<String>, content: impl Into<String>, proxied: bool) -> Self {
        Self {
            record_type: ADDRESS_RECORD_TYPE.to_string(),
            name: name.into(),
            content: content.into(),
            proxied,
        }
    }

    /// Payload replacing `record`, keeping its type and name
    pub fn replacing(record: &DnsRecord, content: impl Into<String>, proxied: bool) -> Self {
        Self {
            record_type: record.record_type.clone(),
            name: record.name.clone(),
            content: content.into(),
            proxied,
        }
    }
}

/// Trait for DNS provider implementations
///
/// # Trust Level: Untrusted
///
/// Providers are isolated, stateless and single-shot:
/// - one logical API operation per call, no retry or backoff
///   (a 429 is reported as [`ProviderError::RateLimited`] and left to the caller)
/// - no caching between calls; every cycle re-reads authoritative state
/// - no decision about whether a write is needed (owned by the reconciler)
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Check that the configured credential is active
    ///
    /// Returns `false` on any non-success response or transport failure.
    /// Never returns an error to the caller.
    async fn verify_credential(&self) -> bool;

    /// List every zone visible to the credential
    async fn list_zones(&self) -> Result<Vec<Zone>, ProviderError>;

    /// List every record in a zone
    async fn list_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>, ProviderError>;

    /// Replace an existing record with `payload`
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        payload: &RecordPayload,
    ) -> Result<DnsRecord, ProviderError>;

    /// Create a new record from `payload`
    async fn create_record(
        &self,
        zone_id: &str,
        payload: &RecordPayload,
    ) -> Result<DnsRecord, ProviderError>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
