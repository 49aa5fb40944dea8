//! Configuration types for the dnsync system
//!
//! One immutable [`DdnsConfig`] is built at startup and passed explicitly to
//! every component. Nothing else reads the environment.
//!
//! ## Environment
//!
//! | Variable | Meaning |
//! |---|---|
//! | `CLOUDFLARE_API_KEY` | bearer token for the provider API (required) |
//! | `DNS_URL` | comma-separated domains to keep in sync (required) |
//! | `CRON_SCHEDULE` | cron expression, 5 to 7 fields (required) |
//! | `TIMEZONE` | IANA timezone for the schedule (default `Europe/London`) |
//! | `PROXIED` | proxy flag for all records; anything but `false` means true |
//! | `IP_OVERRIDE` | literal IPv4 address, skips IP resolution |
//! | `WEBHOOK_URL` / `WEBHOOK_METHOD` | notification sink, both or neither, `GET` or `POST` |
//! | `DEBUG` | log raw provider responses |
//! | `DDNS_MODE` | `dry-run` skips provider writes |
//! | `LOG_LEVEL` | trace, debug, info, warn or error (default `info`) |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::scheduler::CronSchedule;

pub const ENV_API_TOKEN: &str = "CLOUDFLARE_API_KEY";
pub const ENV_DOMAINS: &str = "DNS_URL";
pub const ENV_SCHEDULE: &str = "CRON_SCHEDULE";
pub const ENV_TIMEZONE: &str = "TIMEZONE";
pub const ENV_PROXIED: &str = "PROXIED";
pub const ENV_IP_OVERRIDE: &str = "IP_OVERRIDE";
pub const ENV_WEBHOOK_URL: &str = "WEBHOOK_URL";
pub const ENV_WEBHOOK_METHOD: &str = "WEBHOOK_METHOD";
pub const ENV_DEBUG: &str = "DEBUG";
pub const ENV_MODE: &str = "DDNS_MODE";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

/// Main dnsync configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// Provider API token
    /// ⚠️ NEVER log this value
    #[serde(skip_serializing)]
    pub api_token: String,

    /// Raw comma-separated domain list
    pub domains: String,

    /// Cron expression
    pub schedule: String,

    /// IANA timezone name used to evaluate `schedule`
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Desired proxy flag, shared by every managed record
    #[serde(default = "default_proxied")]
    pub proxied: bool,

    /// Literal address used instead of resolving the public IP
    #[serde(default)]
    pub ip_override: Option<String>,

    /// Optional notification sink
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,

    /// Verbose logging of raw provider responses
    #[serde(default)]
    pub debug: bool,

    /// Perform reads but skip provider writes
    #[serde(default)]
    pub dry_run: bool,

    /// Log level for the daemon
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Custom Debug implementation that hides the API token
impl fmt::Debug for DdnsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DdnsConfig")
            .field("api_token", &"<REDACTED>")
            .field("domains", &self.domains)
            .field("schedule", &self.schedule)
            .field("timezone", &self.timezone)
            .field("proxied", &self.proxied)
            .field("ip_override", &self.ip_override)
            .field("webhook", &self.webhook)
            .field("debug", &self.debug)
            .field("dry_run", &self.dry_run)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl DdnsConfig {
    /// Create a configuration with defaults for everything optional
    pub fn new(
        api_token: impl Into<String>,
        domains: impl Into<String>,
        schedule: impl Into<String>,
    ) -> Self {
        Self {
            api_token: api_token.into(),
            domains: domains.into(),
            schedule: schedule.into(),
            timezone: default_timezone(),
            proxied: default_proxied(),
            ip_override: None,
            webhook: None,
            debug: false,
            dry_run: false,
            log_level: default_log_level(),
        }
    }

    /// Load and validate configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load and validate configuration through an arbitrary lookup
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let webhook = match (get(ENV_WEBHOOK_URL), get(ENV_WEBHOOK_METHOD)) {
            (Some(url), Some(method)) => Some(WebhookConfig {
                url,
                method: method.parse()?,
            }),
            (None, None) => None,
            _ => {
                return Err(Error::config(format!(
                    "{ENV_WEBHOOK_URL} and {ENV_WEBHOOK_METHOD} are both required"
                )));
            }
        };

        let config = Self {
            api_token: get(ENV_API_TOKEN).unwrap_or_default(),
            domains: get(ENV_DOMAINS).unwrap_or_default(),
            schedule: get(ENV_SCHEDULE).unwrap_or_default(),
            timezone: get(ENV_TIMEZONE).unwrap_or_else(default_timezone),
            proxied: get(ENV_PROXIED).is_none_or(|v| v != "false"),
            ip_override: get(ENV_IP_OVERRIDE),
            webhook,
            debug: get(ENV_DEBUG).is_some_and(|v| v != "false" && v != "0"),
            dry_run: get(ENV_MODE).is_some_and(|v| v.eq_ignore_ascii_case("dry-run")),
            log_level: get(ENV_LOG_LEVEL).unwrap_or_else(default_log_level),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_token.is_empty() {
            return Err(Error::config(format!("{ENV_API_TOKEN} is required")));
        }

        if self.domains.trim().is_empty() {
            return Err(Error::config(format!("{ENV_DOMAINS} is required")));
        }

        if self.schedule.trim().is_empty() {
            return Err(Error::config(format!("{ENV_SCHEDULE} is required")));
        }

        CronSchedule::new(&self.schedule, &self.timezone)?;

        if let Some(ref raw) = self.ip_override {
            parse_ipv4_override(raw)?;
        }

        if let Some(ref webhook) = self.webhook {
            webhook.validate()?;
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(Error::config(format!(
                    "{ENV_LOG_LEVEL} '{other}' is not valid. \
                    Valid levels: trace, debug, info, warn, error"
                )));
            }
        }

        Ok(())
    }

    /// The operator override as an address, if configured
    pub fn ip_override_addr(&self) -> Result<Option<IpAddr>> {
        self.ip_override
            .as_deref()
            .map(|raw| parse_ipv4_override(raw).map(IpAddr::V4))
            .transpose()
    }

    /// The cron schedule evaluated in the configured timezone
    pub fn cron_schedule(&self) -> Result<CronSchedule> {
        CronSchedule::new(&self.schedule, &self.timezone)
    }
}

fn parse_ipv4_override(raw: &str) -> Result<Ipv4Addr> {
    raw.trim().parse().map_err(|_| {
        Error::config(format!(
            "{ENV_IP_OVERRIDE} must be an IPv4 address. Got: {raw}"
        ))
    })
}

fn default_timezone() -> String {
    "Europe/London".to_string()
}

fn default_proxied() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Webhook notification sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Target URL
    pub url: String,
    /// HTTP verb
    pub method: WebhookMethod,
}

impl WebhookConfig {
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.url).map_err(|e| {
            Error::config(format!("{ENV_WEBHOOK_URL} is not a valid URL ({e}): {}", self.url))
        })?;

        match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(Error::config(format!(
                "{ENV_WEBHOOK_URL} must use HTTP or HTTPS scheme. Got: {scheme}"
            ))),
        }
    }
}

/// HTTP verb used for webhook delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebhookMethod {
    Get,
    Post,
}

impl WebhookMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl FromStr for WebhookMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            other => Err(Error::config(format!(
                "{ENV_WEBHOOK_METHOD} must be either GET or POST. Got: {other}"
            ))),
        }
    }
}

impl fmt::Display for WebhookMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
