// # dnsync-core
//
// Core library for the scheduled DNS address synchronizer.
//
// ## Architecture Overview
//
// Keeps one or more address records on a managed DNS provider pointed at
// the machine's current public IP, on a cron cadence:
// - **IpSource**: Trait for resolving the current public IP
// - **DnsProvider**: Capability set consumed from the provider API
// - **Notifier**: Trait for one-way status events
// - **DomainReconciler**: Minimal create/update decision for one domain
// - **DdnsEngine**: Runs one cycle (credential, IP, every domain in order)
// - **Scheduler**: Cron cadence in a timezone, stoppable through a handle
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from transports
// 2. **Stateless Cycles**: Provider state is re-read every cycle, nothing is cached
// 3. **Isolation**: A failing domain never stops its siblings
// 4. **Library-First**: All core functionality can be used as a library

pub mod config;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod traits;

// Re-export core types for convenience
pub use config::{DdnsConfig, WebhookConfig, WebhookMethod};
pub use engine::{CycleReport, DdnsEngine, OutcomeKind, ReconciliationOutcome};
pub use error::{Error, ProviderError, Result};
pub use scheduler::{CronSchedule, ScheduleHandle, Scheduler, StopReason};
pub use traits::{DnsProvider, IpSource, Notifier};
