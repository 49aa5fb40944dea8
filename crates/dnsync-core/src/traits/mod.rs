//! Core traits for the dnsync system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`IpSource`]: Resolve the current public IP
//! - [`DnsProvider`]: Read and write records via provider APIs
//! - [`Notifier`]: Deliver status events to an external sink

pub mod dns_provider;
pub mod ip_source;
pub mod notifier;

pub use dns_provider::{ADDRESS_RECORD_TYPE, DnsProvider, DnsRecord, RecordPayload, Zone};
pub use ip_source::{IpSource, StaticIpSource};
pub use notifier::{Notification, NotificationStatus, Notifier};
