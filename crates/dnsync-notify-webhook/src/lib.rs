// # Webhook Notifier
//
// Delivers dnsync status events to a user-supplied HTTP endpoint.
//
// ## Wire Format
//
// - `GET`: `status` and `message` appended as query parameters
// - `POST`: JSON body `{"status": "...", "message": "..."}`
//
// Any 2xx answer counts as delivered. Each notification gets exactly one
// attempt; failures are returned to the caller, which logs and moves on.

use async_trait::async_trait;
use dnsync_core::config::{WebhookConfig, WebhookMethod};
use dnsync_core::traits::{Notification, Notifier};
use dnsync_core::{Error, Result};
use std::time::Duration;
use url::Url;

/// HTTP timeout for a single delivery
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP webhook notifier
#[derive(Debug)]
pub struct WebhookNotifier {
    url: Url,
    method: WebhookMethod,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Create a notifier from validated webhook settings
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        config.validate()?;

        let url = Url::parse(&config.url)
            .map_err(|e| Error::config(format!("Invalid webhook URL: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            url,
            method: config.method,
            client,
        })
    }

    pub fn method(&self) -> WebhookMethod {
        self.method
    }

    /// HTTP request carrying `notification`
    fn request(&self, notification: &Notification) -> Result<reqwest::Request> {
        let builder = match self.method {
            WebhookMethod::Get => self.client.get(query_url(&self.url, notification)),
            WebhookMethod::Post => self.client.post(self.url.clone()).json(notification),
        };

        builder
            .build()
            .map_err(|e| Error::notification(format!("Failed to build webhook request: {e}")))
    }
}

/// Target URL with the notification encoded as query parameters
fn query_url(base: &Url, notification: &Notification) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut()
        .append_pair("status", notification.status.as_str())
        .append_pair("message", &notification.message);
    url
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let request = self.request(notification)?;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| Error::notification(format!("Webhook request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::notification(format!(
                "Webhook answered {}",
                status.as_u16()
            )));
        }

        tracing::debug!(
            "Webhook {} delivered ({}): {}",
            self.method,
            notification.status,
            notification.message
        );
        Ok(())
    }
}
