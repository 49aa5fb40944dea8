// # Notifier Trait
//
// One-way status events delivered to an external endpoint.
//
// ## Implementations
//
// - HTTP webhook: `dnsync-notify-webhook` crate
//
// Delivery is fire-and-forget from the engine's point of view: an `Err`
// is logged and otherwise ignored, never aborting reconciliation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status carried by a notification payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Success,
    Progress,
    Error,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Progress => "progress",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Webhook payload: `{"status": "...", "message": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub status: NotificationStatus,
    pub message: String,
}

impl Notification {
    pub fn new(status: NotificationStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationStatus::Success, message)
    }

    pub fn progress(message: impl Into<String>) -> Self {
        Self::new(NotificationStatus::Progress, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationStatus::Error, message)
    }
}

/// Trait for status notification sinks
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification, single attempt
    async fn notify(&self, notification: &Notification) -> Result<(), crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let json = serde_json::to_value(Notification::progress("creating")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "status": "progress", "message": "creating" })
        );
    }
}
