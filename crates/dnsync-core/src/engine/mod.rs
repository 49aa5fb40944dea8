//! Core dnsync engine
//!
//! The DdnsEngine runs one synchronization cycle at a time:
//! - Verifying the provider credential
//! - Resolving the public IP once
//! - Reconciling every configured domain, in order, one after another
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   run_cycle   ┌──────────────┐
//! │  Scheduler  │──────────────▶│  DdnsEngine  │
//! └─────────────┘               └──────────────┘
//!        ▲                              │
//!        │ stop()          ┌────────────┼─────────────┐
//!        │                 ▼            ▼             ▼
//!        │          ┌───────────┐ ┌───────────┐ ┌──────────┐
//!        └──────────│DnsProvider│ │ IpSource  │ │ Notifier │
//!   (credential     └───────────┘ └───────────┘ └──────────┘
//!    rejected)
//! ```
//!
//! ## Cycle Pipeline
//!
//! 1. `verify_credential()`; on rejection stop the schedule and end the cycle
//! 2. Resolve the IP (override first); on failure end the cycle, no notification
//! 3. Split the domain list on commas
//! 4. Reconcile each domain sequentially; a failing domain never stops the next
//! 5. Anything else that fails, panics included, is logged and reported as an
//!    error notification; the scheduler keeps its cadence

pub mod reconcile;

pub use reconcile::{
    DesiredState, DomainReconciler, OutcomeKind, ReconciliationOutcome, derive_zone,
};

use futures_util::FutureExt;
use std::any::Any;
use std::net::IpAddr;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, info, warn};

use crate::config::DdnsConfig;
use crate::error::{Error, Result};
use crate::scheduler::ScheduleHandle;
use crate::traits::{DnsProvider, IpSource, Notification, Notifier};

/// Split a comma-separated domain list into trimmed names
///
/// Duplicates and empty entries are kept.
pub fn split_domains(list: &str) -> Vec<String> {
    list.split(',').map(|domain| domain.trim().to_string()).collect()
}

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleReport {
    /// The credential was rejected; the schedule has been stopped
    Halted,
    /// The public IP could not be resolved; no domain was touched
    Aborted { reason: String },
    /// Every domain was attempted, in configuration order
    Completed {
        target_ip: IpAddr,
        outcomes: Vec<ReconciliationOutcome>,
    },
    /// An unexpected failure ended the cycle early
    Failed { error: String },
}

/// Core dnsync engine
///
/// Holds no state between cycles: zones and records are re-read from the
/// provider every time, so repeated cycles converge on external drift.
pub struct DdnsEngine {
    /// DNS provider for reading and writing records
    provider: Box<dyn DnsProvider>,

    /// Resolver used when no override is configured
    ip_source: Box<dyn IpSource>,

    /// Optional status sink
    notifier: Option<Box<dyn Notifier>>,

    /// Raw comma-separated domain list
    domains: String,

    /// Desired proxy flag for every domain
    proxied: bool,

    /// Operator-supplied address that bypasses `ip_source`
    ip_override: Option<IpAddr>,
}

impl DdnsEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `provider`: DNS provider implementation
    /// - `ip_source`: IP resolver implementation
    /// - `config`: validated configuration
    pub fn new(
        provider: Box<dyn DnsProvider>,
        ip_source: Box<dyn IpSource>,
        config: &DdnsConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            provider,
            ip_source,
            notifier: None,
            domains: config.domains.clone(),
            proxied: config.proxied,
            ip_override: config.ip_override_addr()?,
        })
    }

    /// Attach a notifier
    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Run one cycle
    ///
    /// Never returns an error: every failure is logged and folded into the
    /// report. The only side effect on the scheduler is `handle.stop()` when
    /// the credential is rejected.
    pub async fn run_cycle(&self, handle: &ScheduleHandle) -> CycleReport {
        let result = AssertUnwindSafe(self.execute())
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(Error::CycleFailed(panic_message(panic.as_ref()))));

        let report = match result {
            Ok(report) => report,
            Err(Error::CredentialInvalid(reason)) => {
                error!("Provider credential is invalid ({}). Stopping schedule.", reason);
                handle.stop();
                CycleReport::Halted
            }
            Err(Error::IpResolution(reason)) => {
                warn!("Unable to get public IP address: {}", reason);
                CycleReport::Aborted { reason }
            }
            Err(e) => {
                error!("An error occurred while running the cycle: {}", e);
                self.notify(&Notification::error(format!(
                    "An uncaught error occurred while running: {e}"
                )))
                .await;
                CycleReport::Failed {
                    error: e.to_string(),
                }
            }
        };

        info!("Cycle completed, waiting for next scheduled run");
        report
    }

    async fn execute(&self) -> Result<CycleReport> {
        self.verify_credential().await?;

        let target_ip = self.resolve_ip().await?;

        let domains = split_domains(&self.domains);
        debug!("Reconciling {} domain(s)", domains.len());

        let reconciler = DomainReconciler::new(self.provider.as_ref(), self.notifier.as_deref());
        let mut outcomes = Vec::with_capacity(domains.len());

        for domain in domains {
            let desired = DesiredState {
                domain,
                target_ip,
                proxied: self.proxied,
            };
            outcomes.push(reconciler.reconcile(&desired).await);
        }

        Ok(CycleReport::Completed {
            target_ip,
            outcomes,
        })
    }

    async fn verify_credential(&self) -> Result<()> {
        if self.provider.verify_credential().await {
            debug!("{} credential verified", self.provider.provider_name());
            Ok(())
        } else {
            Err(Error::CredentialInvalid(format!(
                "{} rejected the API token",
                self.provider.provider_name()
            )))
        }
    }

    async fn resolve_ip(&self) -> Result<IpAddr> {
        if let Some(ip) = self.ip_override {
            info!("IP Override: {}, not checking public IP address", ip);
            return Ok(ip);
        }

        let ip = self
            .ip_source
            .current()
            .await
            .map_err(|e| {
                if matches!(e, Error::IpResolution(_)) {
                    e
                } else {
                    Error::ip_resolution(e.to_string())
                }
            })?;

        info!("Public IP Address ({}): {}", self.ip_source.source_name(), ip);
        Ok(ip)
    }

    async fn notify(&self, notification: &Notification) {
        if let Some(notifier) = self.notifier.as_deref() {
            reconcile::notify(notifier, notification).await;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}
