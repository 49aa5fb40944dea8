//! Domain reconciler
//!
//! For one domain: find the owning zone, find the existing record, and issue
//! at most one corrective write.
//!
//! ```text
//! start → zone lookup → record lookup → unchanged
//!                                     → create → created
//!                                     → update → updated
//!
//! any lookup or write may escape to zone-not-found or provider-error
//! ```

use futures_util::FutureExt;
use std::net::IpAddr;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, info, warn};

use crate::error::ProviderError;
use crate::traits::{DnsProvider, DnsRecord, Notification, Notifier, RecordPayload, Zone};

/// Zone name owning `domain`: its last two dot-separated labels
///
/// Known limitation: multi-label public suffixes are not recognized, so
/// `sub.example.co.uk` maps to `co.uk`, not `example.co.uk`.
pub fn derive_zone(domain: &str) -> String {
    let labels: Vec<&str> = domain.split('.').collect();
    let start = labels.len().saturating_sub(2);
    labels[start..].join(".")
}

/// What one domain should look like after this cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredState {
    pub domain: String,
    pub target_ip: IpAddr,
    pub proxied: bool,
}

impl DesiredState {
    fn content(&self) -> String {
        self.target_ip.to_string()
    }
}

/// Result category of one domain reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Unchanged,
    Updated,
    Created,
    ZoneNotFound,
    ProviderError,
}

/// Result of reconciling one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationOutcome {
    pub domain: String,
    pub kind: OutcomeKind,
    /// Human-readable before/after description
    pub message: String,
    /// New record content, set for `Updated` and `Created`
    pub content: Option<String>,
}

impl ReconciliationOutcome {
    fn unchanged(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            kind: OutcomeKind::Unchanged,
            message: format!("DNS record for {domain} is already up to date. No action required."),
            content: None,
        }
    }

    fn updated(domain: &str, previous: &DnsRecord, current: &DnsRecord) -> Self {
        Self {
            domain: domain.to_string(),
            kind: OutcomeKind::Updated,
            message: format!(
                "DNS record for {domain} has been updated. IP Address: {} -> {}, Proxied: {} -> {}",
                previous.content, current.content, previous.proxied, current.proxied
            ),
            content: Some(current.content.clone()),
        }
    }

    fn created(domain: &str, record: &DnsRecord) -> Self {
        Self {
            domain: domain.to_string(),
            kind: OutcomeKind::Created,
            message: format!(
                "DNS record for {domain} has been created. IP Address: {}, Proxied: {}",
                record.content, record.proxied
            ),
            content: Some(record.content.clone()),
        }
    }

    fn zone_not_found(domain: &str, zone: &str) -> Self {
        Self {
            domain: domain.to_string(),
            kind: OutcomeKind::ZoneNotFound,
            message: format!(
                "Unable to find zone {zone} for {domain}. \
                Please ensure that the domain is registered with the provider."
            ),
            content: None,
        }
    }

    fn provider_error(domain: &str, err: &ProviderError) -> Self {
        Self {
            domain: domain.to_string(),
            kind: OutcomeKind::ProviderError,
            message: format!("Failed to reconcile DNS record for {domain}: {err}"),
            content: None,
        }
    }

    /// Webhook payload describing this outcome
    pub fn notification(&self) -> Notification {
        match self.kind {
            OutcomeKind::Unchanged | OutcomeKind::Updated => Notification::success(&self.message),
            OutcomeKind::Created => Notification::progress(&self.message),
            OutcomeKind::ZoneNotFound | OutcomeKind::ProviderError => {
                Notification::error(&self.message)
            }
        }
    }
}

/// Reconciles one domain at a time against a provider
///
/// Every call to [`DomainReconciler::reconcile`] ends in exactly one
/// notification, whatever the outcome.
pub struct DomainReconciler<'a> {
    provider: &'a dyn DnsProvider,
    notifier: Option<&'a dyn Notifier>,
}

impl<'a> DomainReconciler<'a> {
    pub fn new(provider: &'a dyn DnsProvider, notifier: Option<&'a dyn Notifier>) -> Self {
        Self { provider, notifier }
    }

    /// Bring one domain to `desired`; provider failures become an outcome
    pub async fn reconcile(&self, desired: &DesiredState) -> ReconciliationOutcome {
        let outcome = match self.apply(desired).await {
            Ok(outcome) => outcome,
            Err(err) => {
                if err.is_rate_limited() {
                    warn!("Rate limited while reconciling {}: {}", desired.domain, err);
                }
                ReconciliationOutcome::provider_error(&desired.domain, &err)
            }
        };

        match outcome.kind {
            OutcomeKind::ZoneNotFound | OutcomeKind::ProviderError => error!("{}", outcome.message),
            _ => info!("{}", outcome.message),
        }

        if let Some(notifier) = self.notifier {
            notify(notifier, &outcome.notification()).await;
        }

        outcome
    }

    async fn apply(
        &self,
        desired: &DesiredState,
    ) -> Result<ReconciliationOutcome, ProviderError> {
        let domain = desired.domain.as_str();
        let zone_name = derive_zone(domain);
        debug!("Parsed zone for {}: {}", domain, zone_name);

        let zones = self.provider.list_zones().await?;
        let Some(zone) = find_zone(&zones, &zone_name) else {
            return Ok(ReconciliationOutcome::zone_not_found(domain, &zone_name));
        };
        info!("Found zone: {} ({})", zone.name, zone.id);

        let records = self.provider.list_records(&zone.id).await?;
        let content = desired.content();

        match find_record(&records, domain) {
            None => {
                info!("DNS record does not exist for {}, creating it", domain);
                let payload = RecordPayload::address(domain, content, desired.proxied);
                let created = self.provider.create_record(&zone.id, &payload).await?;
                Ok(ReconciliationOutcome::created(domain, &created))
            }
            Some(record) if record.content == content && record.proxied == desired.proxied => {
                Ok(ReconciliationOutcome::unchanged(domain))
            }
            Some(record) => {
                if record.content != content {
                    info!(
                        "DNS record for {} needs to be updated. IP Address: {} -> {}",
                        domain, record.content, content
                    );
                }
                if record.proxied != desired.proxied {
                    info!(
                        "DNS record for {} needs to be updated. Proxied: {} -> {}",
                        domain, record.proxied, desired.proxied
                    );
                }

                let payload = RecordPayload::replacing(record, content, desired.proxied);
                let updated = self
                    .provider
                    .update_record(&zone.id, &record.id, &payload)
                    .await?;
                Ok(ReconciliationOutcome::updated(domain, record, &updated))
            }
        }
    }
}

fn find_zone<'z>(zones: &'z [Zone], name: &str) -> Option<&'z Zone> {
    zones.iter().find(|zone| zone.name == name)
}

/// First record whose name equals `domain`; later duplicates are ignored
fn find_record<'r>(records: &'r [DnsRecord], domain: &str) -> Option<&'r DnsRecord> {
    records.iter().find(|record| record.name == domain)
}

/// Deliver one notification, logging and swallowing any failure
///
/// A panicking notifier is treated like a failed delivery.
pub(crate) async fn notify(notifier: &dyn Notifier, notification: &Notification) {
    match AssertUnwindSafe(notifier.notify(notification))
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to deliver {} notification: {}", notification.status, e),
        Err(_) => warn!("Notifier panicked while delivering {} notification", notification.status),
    }
}
