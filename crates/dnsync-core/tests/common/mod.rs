//! Test doubles and common utilities for behavior contract tests
//!
//! The doubles keep their state behind an `Arc`, so a clone handed to the
//! engine shares call logs and records with the clone kept by the test.

#![allow(dead_code)]

use async_trait::async_trait;
use dnsync_core::config::DdnsConfig;
use dnsync_core::traits::{
    DnsProvider, DnsRecord, IpSource, Notification, NotificationStatus, Notifier, RecordPayload,
    Zone,
};
use dnsync_core::{DdnsEngine, Error, ProviderError, Result};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One provider call, as observed by [`RecordingProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    VerifyCredential,
    ListZones,
    ListRecords(String),
    Update {
        zone_id: String,
        record_id: String,
        payload: RecordPayload,
    },
    Create {
        zone_id: String,
        payload: RecordPayload,
    },
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(self, Call::Update { .. } | Call::Create { .. })
    }
}

#[derive(Default)]
struct ProviderState {
    credential_active: bool,
    zones: Vec<Zone>,
    records: HashMap<String, Vec<DnsRecord>>,
    calls: Vec<Call>,
    zone_list_failure: Option<u16>,
    record_list_failures: HashMap<String, u16>,
    write_failure: Option<u16>,
    panic_on_zone_list: bool,
    next_id: usize,
}

/// In-memory provider that records every call and applies writes
#[derive(Clone)]
pub struct RecordingProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ProviderState {
                credential_active: true,
                ..Default::default()
            })),
        }
    }

    pub fn with_zone(self, id: &str, name: &str) -> Self {
        self.state.lock().unwrap().zones.push(Zone {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_record(self, zone_id: &str, record: DnsRecord) -> Self {
        self.state
            .lock()
            .unwrap()
            .records
            .entry(zone_id.to_string())
            .or_default()
            .push(record);
        self
    }

    pub fn with_inactive_credential(self) -> Self {
        self.state.lock().unwrap().credential_active = false;
        self
    }

    /// Make `list_zones()` answer with `status`
    pub fn failing_zone_list(self, status: u16) -> Self {
        self.state.lock().unwrap().zone_list_failure = Some(status);
        self
    }

    /// Make `list_records(zone_id)` answer with `status`
    pub fn failing_record_list(self, zone_id: &str, status: u16) -> Self {
        self.state
            .lock()
            .unwrap()
            .record_list_failures
            .insert(zone_id.to_string(), status);
        self
    }

    /// Make every `create_record()` and `update_record()` answer with `status`
    pub fn failing_writes(self, status: u16) -> Self {
        self.state.lock().unwrap().write_failure = Some(status);
        self
    }

    /// Make `list_zones()` panic
    pub fn panicking_zone_list(self) -> Self {
        self.state.lock().unwrap().panic_on_zone_list = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn records(&self, zone_id: &str) -> Vec<DnsRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(zone_id)
            .cloned()
            .unwrap_or_default()
    }

    fn log(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl DnsProvider for RecordingProvider {
    async fn verify_credential(&self) -> bool {
        self.log(Call::VerifyCredential);
        self.state.lock().unwrap().credential_active
    }

    async fn list_zones(&self) -> std::result::Result<Vec<Zone>, ProviderError> {
        self.log(Call::ListZones);
        if self.state.lock().unwrap().panic_on_zone_list {
            panic!("zone listing blew up");
        }
        let state = self.state.lock().unwrap();
        match state.zone_list_failure {
            Some(status) => Err(ProviderError::from_status(status, "zone list failed")),
            None => Ok(state.zones.clone()),
        }
    }

    async fn list_records(
        &self,
        zone_id: &str,
    ) -> std::result::Result<Vec<DnsRecord>, ProviderError> {
        self.log(Call::ListRecords(zone_id.to_string()));
        let state = self.state.lock().unwrap();
        if let Some(status) = state.record_list_failures.get(zone_id) {
            return Err(ProviderError::from_status(*status, "record list failed"));
        }
        Ok(state.records.get(zone_id).cloned().unwrap_or_default())
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        payload: &RecordPayload,
    ) -> std::result::Result<DnsRecord, ProviderError> {
        self.log(Call::Update {
            zone_id: zone_id.to_string(),
            record_id: record_id.to_string(),
            payload: payload.clone(),
        });

        let mut state = self.state.lock().unwrap();
        if let Some(status) = state.write_failure {
            return Err(ProviderError::from_status(status, "record write failed"));
        }
        let record = state
            .records
            .get_mut(zone_id)
            .and_then(|records| records.iter_mut().find(|r| r.id == record_id))
            .ok_or_else(|| ProviderError::from_status(404, "record not found"))?;

        record.record_type = payload.record_type.clone();
        record.name = payload.name.clone();
        record.content = payload.content.clone();
        record.proxied = payload.proxied;
        Ok(record.clone())
    }

    async fn create_record(
        &self,
        zone_id: &str,
        payload: &RecordPayload,
    ) -> std::result::Result<DnsRecord, ProviderError> {
        self.log(Call::Create {
            zone_id: zone_id.to_string(),
            payload: payload.clone(),
        });

        let mut state = self.state.lock().unwrap();
        if let Some(status) = state.write_failure {
            return Err(ProviderError::from_status(status, "record write failed"));
        }
        state.next_id += 1;
        let record = DnsRecord {
            id: format!("created-{}", state.next_id),
            name: payload.name.clone(),
            record_type: payload.record_type.clone(),
            content: payload.content.clone(),
            proxied: payload.proxied,
        };
        state
            .records
            .entry(zone_id.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// IP source returning a fixed address and counting calls
#[derive(Clone)]
pub struct FixedIpSource {
    ip: IpAddr,
    calls: Arc<AtomicUsize>,
}

impl FixedIpSource {
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IpSource for FixedIpSource {
    async fn current(&self) -> Result<IpAddr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.ip)
    }

    fn source_name(&self) -> &'static str {
        "fixed"
    }
}

/// IP source that always fails
pub struct FailingIpSource;

#[async_trait]
impl IpSource for FailingIpSource {
    async fn current(&self) -> Result<IpAddr> {
        Err(Error::ip_resolution("trace endpoint unreachable"))
    }

    fn source_name(&self) -> &'static str {
        "failing"
    }
}

/// Notifier that keeps every notification, optionally failing each delivery
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    fail: bool,
    panic: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the attempt, then reports a delivery failure
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Records the attempt, then panics
    pub fn panicking() -> Self {
        Self {
            panic: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<NotificationStatus> {
        self.sent().into_iter().map(|n| n.status).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        if self.panic {
            panic!("notifier blew up");
        }
        if self.fail {
            Err(Error::notification("webhook answered 500"))
        } else {
            Ok(())
        }
    }
}

pub const ZONE_ID: &str = "zone-example-com";

pub fn target_ip() -> IpAddr {
    IpAddr::from([203, 0, 113, 5])
}

pub fn a_record(id: &str, name: &str, content: &str, proxied: bool) -> DnsRecord {
    DnsRecord {
        id: id.to_string(),
        name: name.to_string(),
        record_type: "A".to_string(),
        content: content.to_string(),
        proxied,
    }
}

/// Configuration with the given domains and proxy flag
pub fn config(domains: &str, proxied: bool) -> DdnsConfig {
    let mut config = DdnsConfig::new("test-token", domains, "*/5 * * * *");
    config.proxied = proxied;
    config
}

/// Engine wired to the given doubles
pub fn engine(
    provider: &RecordingProvider,
    ip_source: &FixedIpSource,
    notifier: &RecordingNotifier,
    config: &DdnsConfig,
) -> DdnsEngine {
    DdnsEngine::new(Box::new(provider.clone()), Box::new(ip_source.clone()), config)
        .expect("engine construction succeeds")
        .with_notifier(Box::new(notifier.clone()))
}
